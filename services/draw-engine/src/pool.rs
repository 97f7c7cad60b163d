use cosmwasm_std::{Order, StdResult, Storage};
use survey_draw_common::canonicalize;

use crate::error::ContractError;
use crate::state::TOKENS;

/// Every token submitted for an instance, in storage order.
pub fn stored_tokens(storage: &dyn Storage, instance_id: &str) -> StdResult<Vec<String>> {
    TOKENS
        .prefix(instance_id)
        .keys(storage, None, None, Order::Ascending)
        .collect()
}

/// Assemble the candidate pool of an instance: every token submitted so far,
/// de-duplicated and sorted into canonical order. Read only.
pub fn assemble_pool(
    storage: &dyn Storage,
    instance_id: &str,
) -> Result<Vec<String>, ContractError> {
    let pool = canonicalize(stored_tokens(storage, instance_id)?);
    if pool.is_empty() {
        return Err(ContractError::EmptyPool {
            instance_id: instance_id.to_string(),
        });
    }
    Ok(pool)
}
