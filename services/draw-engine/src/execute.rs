use cosmwasm_std::{to_json_binary, Addr, Event, Response, Storage};
use survey_draw_common::selector::select;
use survey_draw_common::types::{DrawMode, DrawRecord, DrawStatus, DrawTrigger, LifecycleState};

use crate::error::ContractError;
use crate::msg::{CallInfo, DrawResponse, UpdateConfigParams};
use crate::pool::assemble_pool;
use crate::sources::SeedSource;
use crate::state::{
    compare_and_set_status, get_record, load_instance, persist_record, StatusSwap,
    SurveyInstance, CONFIG, DRAW_STATS, INSTANCES, TOKENS,
};

pub const MIN_STUCK_DRAW_TIMEOUT_SECONDS: u64 = 60;
pub const MAX_STUCK_DRAW_TIMEOUT_SECONDS: u64 = 30 * 24 * 60 * 60;
pub const MAX_INSTANCE_ID_LEN: usize = 128;
pub const MAX_TOKEN_LEN: usize = 256;

pub fn validate_stuck_draw_timeout(seconds: u64) -> Result<(), ContractError> {
    if !(MIN_STUCK_DRAW_TIMEOUT_SECONDS..=MAX_STUCK_DRAW_TIMEOUT_SECONDS).contains(&seconds) {
        return Err(ContractError::InvalidConfig {
            reason: format!(
                "stuck_draw_timeout_seconds must be between {} and {}, got {}",
                MIN_STUCK_DRAW_TIMEOUT_SECONDS, MAX_STUCK_DRAW_TIMEOUT_SECONDS, seconds
            ),
        });
    }
    Ok(())
}

pub fn validate_program_name(name: &str) -> Result<(), ContractError> {
    if name.trim().is_empty() {
        return Err(ContractError::InvalidConfig {
            reason: "program_name must not be empty".to_string(),
        });
    }
    Ok(())
}

pub fn validate_addr(field: &str, addr: &str) -> Result<Addr, ContractError> {
    if addr.trim().is_empty() || addr.trim() != addr {
        return Err(ContractError::InvalidConfig {
            reason: format!("{field} is not a valid address"),
        });
    }
    Ok(Addr::unchecked(addr))
}

fn validate_instance_id(instance_id: &str) -> Result<(), ContractError> {
    if instance_id.is_empty() || instance_id.len() > MAX_INSTANCE_ID_LEN {
        return Err(ContractError::InvalidInstanceId {
            reason: format!("length must be between 1 and {MAX_INSTANCE_ID_LEN} bytes"),
        });
    }
    Ok(())
}

fn validate_token(token: &str) -> Result<(), ContractError> {
    if token.is_empty() || token.len() > MAX_TOKEN_LEN {
        return Err(ContractError::InvalidToken {
            reason: format!("length must be between 1 and {MAX_TOKEN_LEN} bytes"),
        });
    }
    if token.chars().any(char::is_control) {
        return Err(ContractError::InvalidToken {
            reason: "control characters are not allowed".to_string(),
        });
    }
    Ok(())
}

/// Register a survey instance. Only the lifecycle manager can call.
pub fn register_instance(
    storage: &mut dyn Storage,
    call: &CallInfo,
    instance_id: String,
    draw_enabled: bool,
    draw_mode: DrawMode,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(storage)?;
    if call.sender != config.lifecycle_manager {
        return Err(ContractError::Unauthorized {
            reason: "only the lifecycle manager can register instances".to_string(),
        });
    }

    validate_instance_id(&instance_id)?;
    if INSTANCES.has(storage, &instance_id) {
        return Err(ContractError::InstanceAlreadyExists { instance_id });
    }

    let instance = SurveyInstance {
        id: instance_id.clone(),
        lifecycle: LifecycleState::Running,
        draw_enabled,
        draw_mode,
        draw_status: DrawStatus::None,
        draw_started_at: None,
        token_count: 0,
        registered_at: call.time,
        closed_at: None,
    };
    INSTANCES.save(storage, &instance_id, &instance)?;

    Ok(Response::new()
        .add_attribute("action", "register_instance")
        .add_attribute("instance_id", instance_id.clone())
        .add_event(
            Event::new("survey_instance_registered")
                .add_attribute("instance_id", instance_id)
                .add_attribute("draw_enabled", draw_enabled.to_string())
                .add_attribute("draw_mode", draw_mode.as_str()),
        ))
}

/// Deposit one draw token. Only the response collector can call, and only
/// while the instance is running.
pub fn submit_token(
    storage: &mut dyn Storage,
    call: &CallInfo,
    instance_id: String,
    token: String,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(storage)?;
    if call.sender != config.response_collector {
        return Err(ContractError::Unauthorized {
            reason: "only the response collector can submit tokens".to_string(),
        });
    }

    let mut instance = load_instance(storage, &instance_id)?;
    if instance.lifecycle != LifecycleState::Running {
        return Err(ContractError::InstanceClosed { instance_id });
    }

    validate_token(&token)?;
    if TOKENS.has(storage, (&instance_id, &token)) {
        return Err(ContractError::DuplicateToken { instance_id });
    }

    TOKENS.save(storage, (&instance_id, &token), &())?;
    instance.token_count += 1;
    INSTANCES.save(storage, &instance_id, &instance)?;

    // The token itself stays out of the event log
    Ok(Response::new()
        .add_attribute("action", "submit_token")
        .add_attribute("instance_id", instance_id.clone())
        .add_event(
            Event::new("survey_token_submitted")
                .add_attribute("instance_id", instance_id)
                .add_attribute("token_count", instance.token_count.to_string()),
        ))
}

/// Close a running instance. Only the lifecycle manager can call.
///
/// For auto-mode instances with the draw enabled, the response carries
/// `auto_draw = true`; the closure handler then sends one auto trigger.
pub fn close_instance(
    storage: &mut dyn Storage,
    call: &CallInfo,
    instance_id: String,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(storage)?;
    if call.sender != config.lifecycle_manager {
        return Err(ContractError::Unauthorized {
            reason: "only the lifecycle manager can close instances".to_string(),
        });
    }

    let mut instance = load_instance(storage, &instance_id)?;
    if instance.lifecycle == LifecycleState::Closed {
        return Err(ContractError::InstanceClosed { instance_id });
    }

    instance.lifecycle = LifecycleState::Closed;
    instance.closed_at = Some(call.time);
    INSTANCES.save(storage, &instance_id, &instance)?;

    let auto_draw = instance.draw_enabled && instance.draw_mode == DrawMode::Auto;

    Ok(Response::new()
        .add_attribute("action", "close_instance")
        .add_attribute("instance_id", instance_id.clone())
        .add_attribute("auto_draw", auto_draw.to_string())
        .add_event(
            Event::new("survey_instance_closed")
                .add_attribute("instance_id", instance_id)
                .add_attribute("token_count", instance.token_count.to_string())
                .add_attribute("auto_draw", auto_draw.to_string())
                .add_attribute("timestamp", call.time.seconds().to_string()),
        ))
}

/// Draw the winner of a survey instance.
///
/// 1. Authorize: auto triggers come from the lifecycle manager, manual ones
///    from an operator
/// 2. Preconditions: draw enabled, instance closed, status none
/// 3. CAS the status none -> in_progress
/// 4. Assemble the canonical pool, generate a seed, select the winner
/// 5. Persist the record and mark the status completed
///
/// A completed draw is answered with its stored record, flagged
/// `already_drawn`; nothing is recomputed. If step 4 or 5 fails, the status
/// goes back to none, or to completed when a record for the instance is
/// already stored. Draw stats are only written after the record commits.
pub fn trigger_draw(
    storage: &mut dyn Storage,
    call: &CallInfo,
    seeds: &dyn SeedSource,
    instance_id: String,
    trigger: DrawTrigger,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(storage)?;
    match trigger {
        DrawTrigger::Auto if call.sender != config.lifecycle_manager => {
            return Err(ContractError::Unauthorized {
                reason: "only the lifecycle manager can fire auto draws".to_string(),
            });
        }
        DrawTrigger::Manual if !config.is_operator(&call.sender) => {
            return Err(ContractError::Unauthorized {
                reason: "only operators can trigger manual draws".to_string(),
            });
        }
        _ => {}
    }

    let instance = load_instance(storage, &instance_id)?;
    if !instance.draw_enabled {
        return Err(ContractError::NotDrawEnabled { instance_id });
    }
    if trigger == DrawTrigger::Auto && instance.draw_mode != DrawMode::Auto {
        return Err(ContractError::DrawModeMismatch {
            instance_id,
            mode: instance.draw_mode.as_str().to_string(),
            trigger: trigger.as_str().to_string(),
        });
    }
    if instance.lifecycle == LifecycleState::Running {
        return Err(ContractError::StillRunning { instance_id });
    }

    let started_at = match compare_and_set_status(
        storage,
        &instance_id,
        DrawStatus::None,
        DrawStatus::InProgress,
        call.time,
    )? {
        StatusSwap::Swapped(instance) => instance.draw_started_at.unwrap_or(call.time),
        StatusSwap::Observed(DrawStatus::Completed) => {
            return already_drawn(storage, instance_id);
        }
        StatusSwap::Observed(_) => {
            return Err(ContractError::DrawInProgress { instance_id });
        }
    };

    let record = match run_draw(storage, call, seeds, &instance_id) {
        Ok(record) => record,
        Err(err) => {
            // A stored record is authoritative; otherwise release the instance
            let resolved = match get_record(storage, &instance_id)? {
                Some(_) => DrawStatus::Completed,
                None => DrawStatus::None,
            };
            compare_and_set_status(
                storage,
                &instance_id,
                DrawStatus::InProgress,
                resolved,
                call.time,
            )?;
            return Err(err);
        }
    };

    let data = DrawResponse::from_record(&record, false);

    Ok(Response::new()
        .set_data(to_json_binary(&data)?)
        .add_attribute("action", "trigger_draw")
        .add_attribute("instance_id", instance_id.clone())
        .add_attribute("trigger", trigger.as_str())
        .add_attribute("already_drawn", "false")
        .add_event(
            Event::new("survey_draw_started")
                .add_attribute("instance_id", instance_id.clone())
                .add_attribute("trigger", trigger.as_str())
                .add_attribute("timestamp", started_at.seconds().to_string()),
        )
        .add_event(
            Event::new("survey_draw_completed")
                .add_attribute("instance_id", instance_id.clone())
                .add_attribute("record_id", record.id.to_string())
                .add_attribute("trigger", trigger.as_str())
                .add_attribute("candidates_count", record.candidates_count.to_string())
                .add_attribute("pool_hash", record.pool_hash.clone())
                .add_attribute("seed", record.seed.clone())
                .add_attribute("timestamp", record.created_at.seconds().to_string()),
        )
        .add_event(
            Event::new("survey_draw_winner")
                .add_attribute("instance_id", instance_id)
                .add_attribute("winner_token", record.winner_token),
        ))
}

/// Steps 4 and 5 of a draw, run by the caller that won the CAS.
fn run_draw(
    storage: &mut dyn Storage,
    call: &CallInfo,
    seeds: &dyn SeedSource,
    instance_id: &str,
) -> Result<DrawRecord, ContractError> {
    let pool = assemble_pool(storage, instance_id)?;
    let seed = seeds.next_seed()?;
    let selection = select(&seed, &pool)?;

    let mut stats = DRAW_STATS.load(storage)?;
    let record = DrawRecord {
        id: stats.next_record_id,
        survey_instance_id: instance_id.to_string(),
        seed: hex::encode(seed),
        pool_hash: hex::encode(selection.pool_hash),
        candidates_count: pool.len() as u64,
        winner_token: selection.token,
        created_at: call.time,
    };

    // Commit point. Nothing above has written to the store.
    persist_record(storage, &record)?;
    match compare_and_set_status(
        storage,
        instance_id,
        DrawStatus::InProgress,
        DrawStatus::Completed,
        call.time,
    )? {
        StatusSwap::Swapped(_) => {}
        StatusSwap::Observed(_) => {
            return Err(ContractError::DrawNotInProgress {
                instance_id: instance_id.to_string(),
            })
        }
    }

    stats.next_record_id += 1;
    stats.total_draws_completed += 1;
    DRAW_STATS.save(storage, &stats)?;

    Ok(record)
}

fn already_drawn(storage: &dyn Storage, instance_id: String) -> Result<Response, ContractError> {
    let record = get_record(storage, &instance_id)?.ok_or_else(|| {
        ContractError::RecordNotFound {
            instance_id: instance_id.clone(),
        }
    })?;

    Ok(Response::new()
        .set_data(to_json_binary(&DrawResponse::from_record(&record, true))?)
        .add_attribute("action", "trigger_draw")
        .add_attribute("instance_id", instance_id)
        .add_attribute("already_drawn", "true"))
}

/// Resolve a draw left `in_progress` by an attempt that died mid-flight.
/// Admin or operators.
///
/// - A record exists: the attempt died after the insert; the status is
///   repaired to completed.
/// - No record and the timeout has passed: the status goes back to none and
///   the instance can be drawn again. The lost attempt's seed and pool are
///   never recovered.
pub fn reset_stuck_draw(
    storage: &mut dyn Storage,
    call: &CallInfo,
    instance_id: String,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(storage)?;
    if call.sender != config.admin && !config.is_operator(&call.sender) {
        return Err(ContractError::Unauthorized {
            reason: "only admin or operators can reset draws".to_string(),
        });
    }

    let instance = load_instance(storage, &instance_id)?;
    if instance.draw_status != DrawStatus::InProgress {
        return Err(ContractError::DrawNotInProgress { instance_id });
    }

    if get_record(storage, &instance_id)?.is_some() {
        compare_and_set_status(
            storage,
            &instance_id,
            DrawStatus::InProgress,
            DrawStatus::Completed,
            call.time,
        )?;
        return Ok(Response::new()
            .add_attribute("action", "reset_stuck_draw")
            .add_attribute("instance_id", instance_id.clone())
            .add_attribute("resolution", "completed")
            .add_event(
                Event::new("survey_draw_reset")
                    .add_attribute("instance_id", instance_id)
                    .add_attribute("resolution", "completed"),
            ));
    }

    let deadline = stuck_deadline(&instance, config.stuck_draw_timeout_seconds);
    if call.time.seconds() <= deadline {
        return Err(ContractError::DrawNotStuck {
            instance_id,
            deadline,
        });
    }

    compare_and_set_status(
        storage,
        &instance_id,
        DrawStatus::InProgress,
        DrawStatus::None,
        call.time,
    )?;

    let mut stats = DRAW_STATS.load(storage)?;
    stats.total_draws_reset += 1;
    DRAW_STATS.save(storage, &stats)?;

    Ok(Response::new()
        .add_attribute("action", "reset_stuck_draw")
        .add_attribute("instance_id", instance_id.clone())
        .add_attribute("resolution", "none")
        .add_event(
            Event::new("survey_draw_reset")
                .add_attribute("instance_id", instance_id)
                .add_attribute("resolution", "none")
                .add_attribute("deadline", deadline.to_string())
                .add_attribute("timestamp", call.time.seconds().to_string()),
        ))
}

/// Unix seconds after which an in-progress draw counts as stuck.
pub fn stuck_deadline(instance: &SurveyInstance, timeout_seconds: u64) -> u64 {
    instance
        .draw_started_at
        .map(|t| t.seconds())
        .unwrap_or(0)
        .saturating_add(timeout_seconds)
}

/// Update configuration. Admin only.
pub fn update_config(
    storage: &mut dyn Storage,
    call: &CallInfo,
    params: UpdateConfigParams,
) -> Result<Response, ContractError> {
    let UpdateConfigParams {
        program_name,
        add_operators,
        remove_operators,
        lifecycle_manager,
        response_collector,
        stuck_draw_timeout_seconds,
    } = params;

    let mut config = CONFIG.load(storage)?;

    if call.sender != config.admin {
        return Err(ContractError::Unauthorized {
            reason: "only admin can update config".to_string(),
        });
    }

    if let Some(name) = program_name {
        validate_program_name(&name)?;
        config.program_name = name;
    }
    for op in remove_operators.unwrap_or_default() {
        let addr = validate_addr("operator", &op)?;
        config.operators.retain(|a| *a != addr);
    }
    for op in add_operators.unwrap_or_default() {
        let addr = validate_addr("operator", &op)?;
        if !config.operators.contains(&addr) {
            config.operators.push(addr);
        }
    }
    if let Some(manager) = lifecycle_manager {
        config.lifecycle_manager = validate_addr("lifecycle_manager", &manager)?;
    }
    if let Some(collector) = response_collector {
        config.response_collector = validate_addr("response_collector", &collector)?;
    }
    if let Some(timeout) = stuck_draw_timeout_seconds {
        validate_stuck_draw_timeout(timeout)?;
        config.stuck_draw_timeout_seconds = timeout;
    }

    CONFIG.save(storage, &config)?;

    Ok(Response::new().add_attribute("action", "update_config"))
}
