use cosmwasm_std::StdError;
use survey_draw_common::SelectionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContractError {
    #[error("{0}")]
    Std(#[from] StdError),

    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("survey instance {instance_id} not found")]
    InstanceNotFound { instance_id: String },

    #[error("survey instance {instance_id} is already registered")]
    InstanceAlreadyExists { instance_id: String },

    #[error("survey instance {instance_id} is closed")]
    InstanceClosed { instance_id: String },

    #[error("invalid instance id: {reason}")]
    InvalidInstanceId { reason: String },

    #[error("invalid draw token: {reason}")]
    InvalidToken { reason: String },

    #[error("draw token already submitted for survey instance {instance_id}")]
    DuplicateToken { instance_id: String },

    // ── Draw taxonomy ──
    #[error("draw is not enabled for survey instance {instance_id}")]
    NotDrawEnabled { instance_id: String },

    #[error("survey instance {instance_id} is still running")]
    StillRunning { instance_id: String },

    #[error("survey instance {instance_id} has no draw tokens")]
    EmptyPool { instance_id: String },

    #[error("a draw for survey instance {instance_id} is already in progress")]
    DrawInProgress { instance_id: String },

    #[error("survey instance {instance_id} is in {mode} draw mode, got a {trigger} trigger")]
    DrawModeMismatch {
        instance_id: String,
        mode: String,
        trigger: String,
    },

    // ── Record store ──
    #[error("a draw record already exists for survey instance {instance_id}")]
    RecordAlreadyExists { instance_id: String },

    #[error("no draw record for survey instance {instance_id}")]
    RecordNotFound { instance_id: String },

    // ── Reconciliation ──
    #[error("draw for survey instance {instance_id} is not in progress")]
    DrawNotInProgress { instance_id: String },

    #[error("draw for survey instance {instance_id} is not stuck yet (deadline: {deadline})")]
    DrawNotStuck { instance_id: String, deadline: u64 },

    #[error("selection failed: {0}")]
    Selection(#[from] SelectionError),

    #[error("seed generation failed: {reason}")]
    SeedUnavailable { reason: String },

    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },
}
