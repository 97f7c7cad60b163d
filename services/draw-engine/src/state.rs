use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Order, StdResult, Storage, Timestamp};
use cw_storage_plus::{Bound, Item, Map};
use survey_draw_common::types::{DrawMode, DrawRecord, DrawStatus, LifecycleState};

use crate::error::ContractError;

pub const CONFIG: Item<EngineConfig> = Item::new("config");
pub const DRAW_STATS: Item<DrawStats> = Item::new("draw_stats");
pub const INSTANCES: Map<&str, SurveyInstance> = Map::new("instances");
/// Response store: (instance_id, token) -> ()
pub const TOKENS: Map<(&str, &str), ()> = Map::new("tokens");
/// Draw record store: at most one record per instance, never updated
pub const DRAW_RECORDS: Map<&str, DrawRecord> = Map::new("draw_records");

#[cw_serde]
pub struct EngineConfig {
    pub admin: Addr,
    pub operators: Vec<Addr>,
    /// Registers and closes instances, fires auto-mode draws
    pub lifecycle_manager: Addr,
    /// Deposits draw tokens
    pub response_collector: Addr,
    /// Name printed on draw reports
    pub program_name: String,
    /// How long a draw may sit in progress before it counts as stuck (seconds)
    pub stuck_draw_timeout_seconds: u64,
}

#[cw_serde]
pub struct DrawStats {
    pub next_record_id: u64,
    pub total_draws_completed: u64,
    pub total_draws_reset: u64,
}

#[cw_serde]
pub struct SurveyInstance {
    pub id: String,
    pub lifecycle: LifecycleState,
    pub draw_enabled: bool,
    pub draw_mode: DrawMode,
    pub draw_status: DrawStatus,
    /// Set when the draw moves to InProgress, for stuck-draw detection
    pub draw_started_at: Option<Timestamp>,
    pub token_count: u64,
    pub registered_at: Timestamp,
    pub closed_at: Option<Timestamp>,
}

impl EngineConfig {
    pub fn is_operator(&self, addr: &Addr) -> bool {
        self.operators.contains(addr)
    }
}

pub fn load_instance(
    storage: &dyn Storage,
    instance_id: &str,
) -> Result<SurveyInstance, ContractError> {
    INSTANCES
        .may_load(storage, instance_id)?
        .ok_or_else(|| ContractError::InstanceNotFound {
            instance_id: instance_id.to_string(),
        })
}

/// Result of a compare-and-set on the draw status.
#[derive(Debug)]
pub enum StatusSwap {
    /// The status was `expected` and is now the new value
    Swapped(SurveyInstance),
    /// The status was something else; nothing was written
    Observed(DrawStatus),
}

/// Atomically move the draw status from `expected` to `next`.
pub fn compare_and_set_status(
    storage: &mut dyn Storage,
    instance_id: &str,
    expected: DrawStatus,
    next: DrawStatus,
    now: Timestamp,
) -> Result<StatusSwap, ContractError> {
    let mut instance = load_instance(storage, instance_id)?;
    if instance.draw_status != expected {
        return Ok(StatusSwap::Observed(instance.draw_status));
    }

    instance.draw_status = next;
    instance.draw_started_at = match next {
        DrawStatus::InProgress => Some(now),
        DrawStatus::None => None,
        DrawStatus::Completed => instance.draw_started_at,
    };
    INSTANCES.save(storage, instance_id, &instance)?;
    Ok(StatusSwap::Swapped(instance))
}

/// Insert the record of a draw. A second record for the same instance is
/// refused regardless of what the draw status says.
pub fn persist_record(
    storage: &mut dyn Storage,
    record: &DrawRecord,
) -> Result<(), ContractError> {
    if DRAW_RECORDS.has(storage, &record.survey_instance_id) {
        return Err(ContractError::RecordAlreadyExists {
            instance_id: record.survey_instance_id.clone(),
        });
    }
    DRAW_RECORDS.save(storage, &record.survey_instance_id, record)?;
    Ok(())
}

pub fn get_record(storage: &dyn Storage, instance_id: &str) -> StdResult<Option<DrawRecord>> {
    DRAW_RECORDS.may_load(storage, instance_id)
}

pub fn record_history(
    storage: &dyn Storage,
    start_after: Option<&str>,
    limit: usize,
) -> StdResult<Vec<DrawRecord>> {
    let start = start_after.map(Bound::exclusive);
    DRAW_RECORDS
        .range(storage, start, None, Order::Ascending)
        .take(limit)
        .map(|r| r.map(|(_, record)| record))
        .collect()
}
