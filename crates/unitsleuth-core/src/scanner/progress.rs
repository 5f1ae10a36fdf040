//! Scan progress reporting: lightweight messages sent from the worker
//! tasks to whoever holds the receiving end of a background scan.
use crate::model::ContainerKind;
use std::time::Duration;

/// Progress updates sent from a running scan.
///
/// Units themselves are returned by `DiscoveryHandle::join`; these messages
/// carry only locations, counters and status.
#[derive(Debug, Clone)]
pub enum ScanProgress {
    /// A container was claimed and is being enumerated.
    ContainerEntered {
        location: String,
        kind: ContainerKind,
    },
    /// A non-fatal error (unreadable container, unresolvable entry).
    Error { message: String },
    /// Scan finished (possibly aborted, in which case `units` is zero).
    Complete {
        duration: Duration,
        units: usize,
        error_count: u64,
    },
}
