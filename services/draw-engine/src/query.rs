use cosmwasm_std::{to_json_binary, Binary, Order, StdError, StdResult, Storage, Timestamp};
use survey_draw_common::merkle::{
    build_inclusion_proof, compute_leaf_hash, compute_pool_hash, verify_inclusion_proof,
};
use survey_draw_common::pool::canonicalize;
use survey_draw_common::types::{DrawRecord, DrawStatus};
use survey_draw_common::verify::verify_detailed;

use crate::execute::stuck_deadline;
use crate::msg::{
    CandidatePoolResponse, DrawHistoryResponse, StuckDrawsResponse, VerifyResponse,
    WinnerProofResponse,
};
use crate::pool::stored_tokens;
use crate::report::format_report;
use crate::state::{get_record, record_history, CONFIG, DRAW_STATS, INSTANCES};

fn load_record(storage: &dyn Storage, instance_id: &str) -> StdResult<DrawRecord> {
    get_record(storage, instance_id)?
        .ok_or_else(|| StdError::not_found(format!("draw record for {instance_id}")))
}

pub fn query_config(storage: &dyn Storage) -> StdResult<Binary> {
    let config = CONFIG.load(storage)?;
    to_json_binary(&config)
}

pub fn query_draw_stats(storage: &dyn Storage) -> StdResult<Binary> {
    let stats = DRAW_STATS.load(storage)?;
    to_json_binary(&stats)
}

pub fn query_instance(storage: &dyn Storage, instance_id: String) -> StdResult<Binary> {
    let instance = INSTANCES.may_load(storage, &instance_id)?;
    to_json_binary(&instance)
}

pub fn query_draw_record(storage: &dyn Storage, instance_id: String) -> StdResult<Binary> {
    let record = get_record(storage, &instance_id)?;
    to_json_binary(&record)
}

pub fn query_draw_history(
    storage: &dyn Storage,
    start_after: Option<String>,
    limit: Option<u32>,
) -> StdResult<Binary> {
    let limit = limit.unwrap_or(20).min(100) as usize;
    let records = record_history(storage, start_after.as_deref(), limit)?;
    to_json_binary(&DrawHistoryResponse { records })
}

/// The live candidate pool of an instance, canonical order.
pub fn query_candidate_pool(storage: &dyn Storage, instance_id: String) -> StdResult<Binary> {
    let tokens = canonicalize(stored_tokens(storage, &instance_id)?);
    let pool_hash = compute_pool_hash(&tokens).map(hex::encode).unwrap_or_default();
    to_json_binary(&CandidatePoolResponse {
        instance_id,
        candidates_count: tokens.len() as u64,
        tokens,
        pool_hash,
    })
}

/// Check the stored record of an instance against a supplied pool, or
/// against the tokens the response store currently holds.
pub fn query_verify(
    storage: &dyn Storage,
    instance_id: String,
    pool: Option<Vec<String>>,
) -> StdResult<Binary> {
    let record = load_record(storage, &instance_id)?;
    let pool = match pool {
        Some(pool) => pool,
        None => stored_tokens(storage, &instance_id)?,
    };

    let verification = verify_detailed(&record, pool);
    to_json_binary(&VerifyResponse {
        instance_id,
        valid: verification.is_valid(),
        pool_hash_matches: verification.pool_hash_matches,
        count_matches: verification.count_matches,
        winner_matches: verification.winner_matches,
    })
}

/// Inclusion proof of the winning token against the record's pool hash,
/// built from the live response store.
pub fn query_winner_proof(storage: &dyn Storage, instance_id: String) -> StdResult<Binary> {
    let record = load_record(storage, &instance_id)?;
    let pool = canonicalize(stored_tokens(storage, &instance_id)?);

    let proof = pool
        .binary_search(&record.winner_token)
        .ok()
        .and_then(|index| build_inclusion_proof(&pool, index))
        .ok_or_else(|| StdError::generic_err("winning token is missing from the response store"))?;

    to_json_binary(&WinnerProofResponse {
        instance_id,
        winner_token: record.winner_token,
        pool_hash: record.pool_hash,
        proof,
    })
}

pub fn query_verify_inclusion(
    pool_hash: String,
    proof: Vec<String>,
    token: String,
) -> StdResult<Binary> {
    let leaf_hash = compute_leaf_hash(&token);
    let valid = verify_inclusion_proof(&pool_hash, &proof, &leaf_hash);
    to_json_binary(&valid)
}

pub fn query_report(storage: &dyn Storage, instance_id: String) -> StdResult<Binary> {
    let config = CONFIG.load(storage)?;
    let record = load_record(storage, &instance_id)?;
    to_json_binary(&format_report(&record, &config.program_name))
}

/// Instances whose draw has been in progress for longer than the configured
/// timeout. These need `ResetStuckDraw`.
pub fn query_stuck_draws(storage: &dyn Storage, now: Timestamp) -> StdResult<Binary> {
    let config = CONFIG.load(storage)?;
    let mut instance_ids = Vec::new();
    for item in INSTANCES.range(storage, None, None, Order::Ascending) {
        let (id, instance) = item?;
        if instance.draw_status == DrawStatus::InProgress
            && now.seconds() > stuck_deadline(&instance, config.stuck_draw_timeout_seconds)
        {
            instance_ids.push(id);
        }
    }
    to_json_binary(&StuckDrawsResponse { instance_ids })
}
