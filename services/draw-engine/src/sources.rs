use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use cosmwasm_std::Timestamp;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;
use survey_draw_common::SEED_LEN;

use crate::error::ContractError;

/// Source of draw seeds. Every seed carries the full 256 bits regardless of
/// how the draw was triggered.
pub trait SeedSource: Send + Sync {
    fn next_seed(&self) -> Result<[u8; SEED_LEN], ContractError>;
}

/// Seeds from the operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSeedSource;

impl SeedSource for OsSeedSource {
    fn next_seed(&self) -> Result<[u8; SEED_LEN], ContractError> {
        let mut seed = [0u8; SEED_LEN];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|e| ContractError::SeedUnavailable {
                reason: e.to_string(),
            })?;
        Ok(seed)
    }
}

/// Hands out a fixed list of seeds in order, then fails. Replays and tests.
#[derive(Debug, Default)]
pub struct FixedSeedSource {
    seeds: Mutex<Vec<[u8; SEED_LEN]>>,
}

impl FixedSeedSource {
    pub fn new(seeds: impl IntoIterator<Item = [u8; SEED_LEN]>) -> Self {
        let mut seeds: Vec<_> = seeds.into_iter().collect();
        seeds.reverse();
        FixedSeedSource {
            seeds: Mutex::new(seeds),
        }
    }
}

impl SeedSource for FixedSeedSource {
    fn next_seed(&self) -> Result<[u8; SEED_LEN], ContractError> {
        self.seeds
            .lock()
            .pop()
            .ok_or_else(|| ContractError::SeedUnavailable {
                reason: "fixed seed list exhausted".to_string(),
            })
    }
}

/// Wall clock for the engine.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Timestamp::from_nanos(nanos)
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        ManualClock {
            now: Mutex::new(now),
        }
    }

    pub fn advance_seconds(&self, seconds: u64) {
        let mut now = self.now.lock();
        *now = now.plus_seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}
