use cosmwasm_std::{Binary, Response, StdResult, Storage, Timestamp};
use cw2::{get_contract_version, set_contract_version};

use crate::error::ContractError;
use crate::execute;
use crate::msg::{CallInfo, ExecuteMsg, InstantiateMsg, MigrateMsg, QueryMsg, UpdateConfigParams};
use crate::query;
use crate::sources::SeedSource;
use crate::state::{DrawStats, EngineConfig, CONFIG, DRAW_STATS};

pub const ENGINE_NAME: &str = "crates.io:survey-draw-engine";
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize an empty store. The caller becomes admin.
pub fn instantiate(
    storage: &mut dyn Storage,
    call: &CallInfo,
    msg: InstantiateMsg,
) -> Result<Response, ContractError> {
    set_contract_version(storage, ENGINE_NAME, ENGINE_VERSION)?;

    execute::validate_stuck_draw_timeout(msg.stuck_draw_timeout_seconds)?;
    execute::validate_program_name(&msg.program_name)?;

    let mut operators = Vec::new();
    for op in &msg.operators {
        let addr = execute::validate_addr("operator", op)?;
        if !operators.contains(&addr) {
            operators.push(addr);
        }
    }

    let config = EngineConfig {
        admin: call.sender.clone(),
        operators,
        lifecycle_manager: execute::validate_addr("lifecycle_manager", &msg.lifecycle_manager)?,
        response_collector: execute::validate_addr(
            "response_collector",
            &msg.response_collector,
        )?,
        program_name: msg.program_name,
        stuck_draw_timeout_seconds: msg.stuck_draw_timeout_seconds,
    };
    CONFIG.save(storage, &config)?;

    DRAW_STATS.save(
        storage,
        &DrawStats {
            next_record_id: 0,
            total_draws_completed: 0,
            total_draws_reset: 0,
        },
    )?;

    Ok(Response::new()
        .add_attribute("action", "instantiate")
        .add_attribute("engine", "survey-draw-engine")
        .add_attribute("admin", call.sender.to_string()))
}

pub fn execute(
    storage: &mut dyn Storage,
    call: &CallInfo,
    seeds: &dyn SeedSource,
    msg: ExecuteMsg,
) -> Result<Response, ContractError> {
    match msg {
        ExecuteMsg::RegisterInstance {
            instance_id,
            draw_enabled,
            draw_mode,
        } => execute::register_instance(storage, call, instance_id, draw_enabled, draw_mode),
        ExecuteMsg::SubmitToken { instance_id, token } => {
            execute::submit_token(storage, call, instance_id, token)
        }
        ExecuteMsg::CloseInstance { instance_id } => {
            execute::close_instance(storage, call, instance_id)
        }
        ExecuteMsg::TriggerDraw {
            instance_id,
            trigger,
        } => execute::trigger_draw(storage, call, seeds, instance_id, trigger),
        ExecuteMsg::ResetStuckDraw { instance_id } => {
            execute::reset_stuck_draw(storage, call, instance_id)
        }
        ExecuteMsg::UpdateConfig {
            program_name,
            add_operators,
            remove_operators,
            lifecycle_manager,
            response_collector,
            stuck_draw_timeout_seconds,
        } => execute::update_config(
            storage,
            call,
            UpdateConfigParams {
                program_name,
                add_operators,
                remove_operators,
                lifecycle_manager,
                response_collector,
                stuck_draw_timeout_seconds,
            },
        ),
    }
}

pub fn query(storage: &dyn Storage, now: Timestamp, msg: QueryMsg) -> StdResult<Binary> {
    match msg {
        QueryMsg::Config {} => query::query_config(storage),
        QueryMsg::DrawStats {} => query::query_draw_stats(storage),
        QueryMsg::Instance { instance_id } => query::query_instance(storage, instance_id),
        QueryMsg::DrawRecord { instance_id } => query::query_draw_record(storage, instance_id),
        QueryMsg::DrawHistory { start_after, limit } => {
            query::query_draw_history(storage, start_after, limit)
        }
        QueryMsg::CandidatePool { instance_id } => {
            query::query_candidate_pool(storage, instance_id)
        }
        QueryMsg::Verify { instance_id, pool } => query::query_verify(storage, instance_id, pool),
        QueryMsg::WinnerProof { instance_id } => query::query_winner_proof(storage, instance_id),
        QueryMsg::VerifyInclusion {
            pool_hash,
            proof,
            token,
        } => query::query_verify_inclusion(pool_hash, proof, token),
        QueryMsg::Report { instance_id } => query::query_report(storage, instance_id),
        QueryMsg::StuckDraws {} => query::query_stuck_draws(storage, now),
    }
}

/// Re-stamp the store with the running engine version. Refuses a store
/// written by something else.
pub fn migrate(storage: &mut dyn Storage, _msg: MigrateMsg) -> Result<Response, ContractError> {
    let stored = get_contract_version(storage)?;
    if stored.contract != ENGINE_NAME {
        return Err(ContractError::Unauthorized {
            reason: "Cannot migrate from different engine type".to_string(),
        });
    }

    set_contract_version(storage, ENGINE_NAME, ENGINE_VERSION)?;

    Ok(Response::new()
        .add_attribute("action", "migrate")
        .add_attribute("from_version", stored.version)
        .add_attribute("to_version", ENGINE_VERSION))
}
