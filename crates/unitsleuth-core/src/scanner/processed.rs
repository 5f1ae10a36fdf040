//! Claim set guaranteeing that each container is processed at most once.
//!
//! The insert is the linearisation point: when several tasks race to claim
//! the same key, exactly one `claim` returns `true` and only that task may
//! enumerate the container. Callers claim *before* recursing, which is what
//! breaks cycles in self-referential container graphs.
use crate::model::Location;
use parking_lot::Mutex;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct ProcessedSet {
    claimed: Mutex<HashSet<String>>,
}

impl ProcessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `location` by its canonical key. Returns `false` if another
    /// task already holds it.
    pub fn claim(&self, location: &Location) -> bool {
        self.claim_key(location.key())
    }

    pub fn claim_key(&self, key: impl Into<String>) -> bool {
        self.claimed.lock().insert(key.into())
    }

    pub fn len(&self) -> usize {
        self.claimed.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.lock().is_empty()
    }
}
