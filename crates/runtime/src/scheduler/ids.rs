//! Run identifier generation.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::types::RunId;

/// Supplies collision-free run identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_run_id(&self) -> RunId;
}

/// Random v4 identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_run_id(&self) -> RunId {
        RunId(Uuid::new_v4())
    }
}

/// Deterministic identifiers `1, 2, 3, ...` encoded as UUIDs, for reproducible runs.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_run_id(&self) -> RunId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        RunId(Uuid::from_u128(n as u128))
    }
}
