//! Per-call scan outcome: the units, their origin grouping and counters.
use crate::model::Location;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Counters collected over one `discover_report` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    /// Containers entered (directories at every level plus archives).
    pub containers_processed: u64,
    pub units_discovered: usize,
    pub errors_reported: u64,
    /// A fatal resolver signal stopped the scan; `units` is empty.
    pub aborted: bool,
}

impl ScanStats {
    pub(crate) fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            duration: Duration::ZERO,
            containers_processed: 0,
            units_discovered: 0,
            errors_reported: 0,
            aborted: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScanReport<U> {
    pub units: HashSet<U>,
    /// Units keyed by the top-level container that first produced them.
    pub grouped: HashMap<Location, HashSet<U>>,
    pub stats: ScanStats,
}

impl<U> ScanReport<U> {
    pub(crate) fn empty(stats: ScanStats) -> Self {
        Self {
            units: HashSet::new(),
            grouped: HashMap::new(),
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_serialize() {
        let stats = ScanStats {
            units_discovered: 3,
            errors_reported: 1,
            ..ScanStats::empty(Utc::now())
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["units_discovered"], 3);
        assert_eq!(json["errors_reported"], 1);
        assert_eq!(json["aborted"], false);
        assert!(json["started_at"].is_string());
    }
}
