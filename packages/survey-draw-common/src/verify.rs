use crate::merkle::compute_pool_hash;
use crate::pool::canonicalize;
use crate::selector::{select, SEED_LEN};
use crate::types::DrawRecord;

/// Field-by-field result of checking a draw record against a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Verification {
    pub pool_hash_matches: bool,
    pub count_matches: bool,
    pub winner_matches: bool,
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        self.pool_hash_matches && self.count_matches && self.winner_matches
    }
}

/// Recompute a draw from its disclosed seed and a candidate pool.
///
/// The pool is canonicalized first, so the order in which a verifier
/// collected the tokens does not matter. A seed that is not 32 bytes of hex
/// never verifies.
pub fn verify_detailed<I, S>(record: &DrawRecord, pool: I) -> Verification
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let pool = canonicalize(pool);

    let pool_hash_matches = compute_pool_hash(&pool)
        .map(|h| hex::encode(h) == record.pool_hash.to_ascii_lowercase())
        .unwrap_or(false);
    let count_matches = pool.len() as u64 == record.candidates_count;

    let seed: Option<[u8; SEED_LEN]> = hex::decode(&record.seed)
        .ok()
        .and_then(|bytes| bytes.try_into().ok());
    let winner_matches = seed
        .and_then(|seed| select(&seed, &pool).ok())
        .map(|selection| selection.token == record.winner_token)
        .unwrap_or(false);

    Verification {
        pool_hash_matches,
        count_matches,
        winner_matches,
    }
}

/// True when `pool` is exactly the pool the record was drawn from and the
/// disclosed seed selects the recorded winner from it.
pub fn verify<I, S>(record: &DrawRecord, pool: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    verify_detailed(record, pool).is_valid()
}
