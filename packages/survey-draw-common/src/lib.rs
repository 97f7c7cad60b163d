pub mod merkle;
pub mod pool;
pub mod selector;
pub mod types;
pub mod verify;

pub use merkle::{build_inclusion_proof, compute_leaf_hash, compute_pool_hash, verify_inclusion_proof};
pub use pool::canonicalize;
pub use selector::{select, Selection, SelectionError, MAX_SELECTION_ATTEMPTS, SEED_LEN};
pub use types::{DrawMode, DrawRecord, DrawStatus, DrawTrigger, LifecycleState};
pub use verify::{verify, verify_detailed, Verification};
