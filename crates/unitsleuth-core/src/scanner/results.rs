//! Append-only result set shared by every task of one scan.
//!
//! Each unit remembers the top-level container that first produced it, so
//! the store can be read back either flat or grouped by origin. Membership
//! only ever grows while the scan runs.
use crate::model::Location;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

#[derive(Debug)]
pub struct ResultStore<U> {
    units: Mutex<HashMap<U, Location>>,
}

impl<U> Default for ResultStore<U> {
    fn default() -> Self {
        Self {
            units: Mutex::new(HashMap::new()),
        }
    }
}

impl<U: Clone + Eq + Hash> ResultStore<U> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `unit` under `origin`. A unit already present keeps its first
    /// origin and `false` is returned.
    pub fn insert(&self, origin: &Location, unit: U) -> bool {
        let mut units = self.units.lock();
        if units.contains_key(&unit) {
            return false;
        }
        units.insert(unit, origin.clone());
        true
    }

    pub fn len(&self) -> usize {
        self.units.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.lock().is_empty()
    }

    /// Flat set and origin-grouped view in one pass.
    pub fn into_parts(self) -> (HashSet<U>, HashMap<Location, HashSet<U>>) {
        let units = self.units.into_inner();
        let mut flat = HashSet::with_capacity(units.len());
        let mut grouped: HashMap<Location, HashSet<U>> = HashMap::new();
        for (unit, origin) in units {
            flat.insert(unit.clone());
            grouped.entry(origin).or_default().insert(unit);
        }
        (flat, grouped)
    }
}
