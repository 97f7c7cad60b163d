use cosmwasm_std::Uint256;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::merkle::compute_pool_hash;

/// Seed length in bytes (256 bits of entropy).
pub const SEED_LEN: usize = 32;

/// Upper bound on rejection-sampling rounds. A 256-bit digest is rejected
/// with probability below `N / 2^256`, so the cap is never reached in
/// practice; it only keeps the loop bounded.
pub const MAX_SELECTION_ATTEMPTS: u32 = 16;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectionError {
    #[error("cannot select from an empty pool")]
    EmptyPool,

    #[error("rejection sampling gave up after {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },
}

/// Outcome of a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    pub token: String,
    pub pool_hash: [u8; 32],
    /// Number of digests drawn, 1 unless a digest fell into the rejection zone
    pub attempts: u32,
}

/// Select the winner of a canonical pool.
///
/// 1. digest = sha256(seed || pool_hash)
/// 2. r = digest as a big-endian 256-bit integer
/// 3. if r falls in the top `2^256 mod N` values, digest = sha256(digest) and retry
/// 4. index = r mod N
///
/// `pool` must already be canonical (see [`crate::pool::canonicalize`]); the
/// index is taken against the order given.
pub fn select(seed: &[u8; SEED_LEN], pool: &[String]) -> Result<Selection, SelectionError> {
    let pool_hash = compute_pool_hash(pool).ok_or(SelectionError::EmptyPool)?;
    let n = Uint256::from(pool.len() as u64);

    let mut hasher = Sha256::new();
    hasher.update(seed);
    hasher.update(pool_hash);
    let digest: [u8; 32] = hasher.finalize().into();

    let (index, attempts) = sample(digest, n, |d| Sha256::digest(d).into())?;
    Ok(Selection {
        index,
        token: pool[index].clone(),
        pool_hash,
        attempts,
    })
}

/// 2^256 mod N, computed without leaving 256 bits. Digests in the top
/// `rejected_tail` values would bias `r mod N` and are redrawn.
fn rejected_tail(n: Uint256) -> Uint256 {
    (Uint256::MAX % n + Uint256::one()) % n
}

/// Index for one digest value, or `None` when `r` falls in the rejected tail.
fn reduce(r: Uint256, n: Uint256) -> Option<usize> {
    let tail = rejected_tail(n);
    if tail.is_zero() || r <= Uint256::MAX - tail {
        Some(low_u64(r % n) as usize)
    } else {
        None
    }
}

/// Bounded rejection sampling: reduce `digest`, rehashing it until a value
/// is accepted or `MAX_SELECTION_ATTEMPTS` digests have been tried.
fn sample(
    mut digest: [u8; 32],
    n: Uint256,
    rehash: impl Fn([u8; 32]) -> [u8; 32],
) -> Result<(usize, u32), SelectionError> {
    for attempt in 1..=MAX_SELECTION_ATTEMPTS {
        if let Some(index) = reduce(Uint256::from_be_bytes(digest), n) {
            return Ok((index, attempt));
        }
        digest = rehash(digest);
    }

    Err(SelectionError::AttemptsExhausted {
        attempts: MAX_SELECTION_ATTEMPTS,
    })
}

/// Low 64 bits of a value already reduced below a `u64` modulus.
fn low_u64(value: Uint256) -> u64 {
    let bytes = value.to_be_bytes();
    let mut low = [0u8; 8];
    low.copy_from_slice(&bytes[24..32]);
    u64::from_be_bytes(low)
}
