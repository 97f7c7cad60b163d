use cosmwasm_schema::cw_serde;
use cosmwasm_std::Timestamp;

/// Lifecycle of a survey instance as reported by the lifecycle manager.
#[cw_serde]
#[derive(Copy)]
pub enum LifecycleState {
    Running,
    Closed,
}

/// How the draw of an instance gets started: at closure, or by an operator.
#[cw_serde]
#[derive(Copy)]
pub enum DrawMode {
    Auto,
    Manual,
}

/// Draw lifecycle of a survey instance.
///
/// Transitions only `None -> InProgress -> Completed`. `Completed` is terminal.
#[cw_serde]
#[derive(Copy)]
pub enum DrawStatus {
    None,
    InProgress,
    Completed,
}

/// Who is asking for the draw.
#[cw_serde]
#[derive(Copy)]
pub enum DrawTrigger {
    /// Fired by the lifecycle manager when an auto-mode instance closes.
    Auto,
    /// Requested by an operator once the instance has closed.
    Manual,
}

/// The audit record of a completed draw. Written once, never updated.
#[cw_serde]
pub struct DrawRecord {
    pub id: u64,
    pub survey_instance_id: String,
    /// Disclosed seed, 32 bytes, hex-encoded
    pub seed: String,
    /// Merkle root over the canonical candidate pool, hex-encoded
    pub pool_hash: String,
    pub candidates_count: u64,
    pub winner_token: String,
    pub created_at: Timestamp,
}

impl DrawStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrawStatus::None => "none",
            DrawStatus::InProgress => "in_progress",
            DrawStatus::Completed => "completed",
        }
    }
}

impl DrawMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrawMode::Auto => "auto",
            DrawMode::Manual => "manual",
        }
    }
}

impl DrawTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrawTrigger::Auto => "auto",
            DrawTrigger::Manual => "manual",
        }
    }
}
