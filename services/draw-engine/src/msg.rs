use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{Addr, Timestamp};
use survey_draw_common::types::{DrawMode, DrawRecord, DrawTrigger};

use crate::report::DrawReport;
use crate::state::{DrawStats, EngineConfig, SurveyInstance};

/// Who sent a message, and when it is being executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallInfo {
    pub sender: Addr,
    pub time: Timestamp,
}

#[cw_serde]
pub struct InstantiateMsg {
    pub program_name: String,
    pub operators: Vec<String>,
    pub lifecycle_manager: String,
    pub response_collector: String,
    pub stuck_draw_timeout_seconds: u64,
}

#[cw_serde]
pub enum ExecuteMsg {
    /// Register a survey instance. Lifecycle manager only.
    RegisterInstance {
        instance_id: String,
        draw_enabled: bool,
        draw_mode: DrawMode,
    },
    /// Deposit the draw token of one response. Response collector only.
    SubmitToken { instance_id: String, token: String },
    /// Close a running instance. Lifecycle manager only.
    CloseInstance { instance_id: String },
    /// Draw the winner of a closed instance. Repeat calls return the
    /// existing result.
    TriggerDraw {
        instance_id: String,
        trigger: DrawTrigger,
    },
    /// Resolve a draw left in progress by a failed attempt. Admin or operator.
    ResetStuckDraw { instance_id: String },
    /// Update configuration. Admin only.
    UpdateConfig {
        program_name: Option<String>,
        add_operators: Option<Vec<String>>,
        remove_operators: Option<Vec<String>>,
        lifecycle_manager: Option<String>,
        response_collector: Option<String>,
        stuck_draw_timeout_seconds: Option<u64>,
    },
}

#[cw_serde]
pub struct UpdateConfigParams {
    pub program_name: Option<String>,
    pub add_operators: Option<Vec<String>>,
    pub remove_operators: Option<Vec<String>>,
    pub lifecycle_manager: Option<String>,
    pub response_collector: Option<String>,
    pub stuck_draw_timeout_seconds: Option<u64>,
}

#[cw_serde]
pub struct MigrateMsg {}

#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    #[returns(EngineConfig)]
    Config {},
    #[returns(DrawStats)]
    DrawStats {},
    #[returns(Option<SurveyInstance>)]
    Instance { instance_id: String },
    #[returns(Option<DrawRecord>)]
    DrawRecord { instance_id: String },
    #[returns(DrawHistoryResponse)]
    DrawHistory {
        start_after: Option<String>,
        limit: Option<u32>,
    },
    #[returns(CandidatePoolResponse)]
    CandidatePool { instance_id: String },
    /// Check the stored record against `pool`, or against the live response
    /// store when no pool is given.
    #[returns(VerifyResponse)]
    Verify {
        instance_id: String,
        pool: Option<Vec<String>>,
    },
    #[returns(WinnerProofResponse)]
    WinnerProof { instance_id: String },
    #[returns(bool)]
    VerifyInclusion {
        pool_hash: String,
        proof: Vec<String>,
        token: String,
    },
    #[returns(DrawReport)]
    Report { instance_id: String },
    #[returns(StuckDrawsResponse)]
    StuckDraws {},
}

/// Returned in the response data of `TriggerDraw`.
#[cw_serde]
pub struct DrawResponse {
    pub instance_id: String,
    pub record_id: u64,
    pub winner_token: String,
    pub candidates_count: u64,
    pub seed: String,
    pub created_at: Timestamp,
    /// True when the draw had already been executed and the stored record
    /// was returned without recomputation
    pub already_drawn: bool,
}

impl DrawResponse {
    pub fn from_record(record: &DrawRecord, already_drawn: bool) -> Self {
        DrawResponse {
            instance_id: record.survey_instance_id.clone(),
            record_id: record.id,
            winner_token: record.winner_token.clone(),
            candidates_count: record.candidates_count,
            seed: record.seed.clone(),
            created_at: record.created_at,
            already_drawn,
        }
    }
}

#[cw_serde]
pub struct DrawHistoryResponse {
    pub records: Vec<DrawRecord>,
}

#[cw_serde]
pub struct CandidatePoolResponse {
    pub instance_id: String,
    pub tokens: Vec<String>,
    pub pool_hash: String,
    pub candidates_count: u64,
}

#[cw_serde]
pub struct VerifyResponse {
    pub instance_id: String,
    pub valid: bool,
    pub pool_hash_matches: bool,
    pub count_matches: bool,
    pub winner_matches: bool,
}

#[cw_serde]
pub struct WinnerProofResponse {
    pub instance_id: String,
    pub winner_token: String,
    pub pool_hash: String,
    pub proof: Vec<String>,
}

#[cw_serde]
pub struct StuckDrawsResponse {
    pub instance_ids: Vec<String>,
}
