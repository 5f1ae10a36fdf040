//! Per-scan shared state handed to every processor.
//!
//! Owns the claim set, the result store and the counters; borrows the
//! configuration and the resolver for the lifetime of one scan.
use super::processed::ProcessedSet;
use super::progress::ScanProgress;
use super::results::ResultStore;
use crate::config::{ScanConfiguration, ScanOptions};
use crate::error::{DiscoveryError, ResolveError};
use crate::model::{Location, QualifiedName};
use crate::resolver::{DiscoveredUnit, LoaderContext, Resolver};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, warn};

pub(crate) struct ScanContext<'a, R: Resolver> {
    pub config: &'a ScanConfiguration,
    pub resolver: &'a R,
    pub processed: ProcessedSet,
    pub results: ResultStore<R::Unit>,
    progress: Option<Sender<ScanProgress>>,
    containers: AtomicU64,
    errors: AtomicU64,
    aborted: AtomicBool,
}

impl<'a, R: Resolver> ScanContext<'a, R> {
    pub fn new(
        config: &'a ScanConfiguration,
        resolver: &'a R,
        progress: Option<Sender<ScanProgress>>,
    ) -> Self {
        Self {
            config,
            resolver,
            processed: ProcessedSet::new(),
            results: ResultStore::new(),
            progress,
            containers: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            aborted: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &'a ScanOptions {
        &self.config.options
    }

    /// Record that `location` is being enumerated.
    pub fn enter(&self, location: &Location) {
        self.containers.fetch_add(1, Ordering::Relaxed);
        debug!("Entering {location}");
        self.send(ScanProgress::ContainerEntered {
            location: location.key(),
            kind: location.kind(),
        });
    }

    /// Funnel a recoverable error to the configured handler.
    pub fn report(&self, err: DiscoveryError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        warn!("{err}");
        self.send(ScanProgress::Error {
            message: err.to_string(),
        });
        self.config.report(&err);
    }

    /// Stop the scan after a fatal resolver signal. Work already running
    /// finishes its current step; nothing new is spawned or resolved.
    pub fn abort(&self, err: DiscoveryError) {
        error!("Aborting scan: {err}");
        self.aborted.store(true, Ordering::SeqCst);
        self.report(err);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }

    pub fn containers_processed(&self) -> u64 {
        self.containers.load(Ordering::Relaxed)
    }

    pub fn errors_reported(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Name-level gates applied before any resolution cost is paid:
    /// anonymous units and ignored namespace prefixes.
    pub fn admits(&self, name: &QualifiedName) -> bool {
        let options = self.options();
        if !options.include_anonymous_units && name.is_anonymous() {
            return false;
        }
        !options.is_ignored_namespace(name)
    }

    pub fn try_resolve(
        &self,
        name: &QualifiedName,
        container: &Location,
        origin: &Location,
    ) -> Result<R::Unit, ResolveError> {
        let context = LoaderContext { container, origin };
        self.resolver.resolve(name, &context)
    }

    /// Resolve `name`, apply the tag filter and record the unit. Failures are
    /// reported; a fatal resolver signal aborts the scan.
    pub fn resolve_candidate(&self, name: QualifiedName, container: &Location, origin: &Location) {
        if self.is_aborted() {
            return;
        }
        match self.try_resolve(&name, container, origin) {
            Ok(unit) => {
                self.accept_unit(unit, origin);
            }
            Err(source) => self.resolution_failed(name, container, source),
        }
    }

    pub fn resolution_failed(&self, name: QualifiedName, container: &Location, source: ResolveError) {
        let fatal = source.is_fatal();
        let err = DiscoveryError::Resolution {
            name,
            location: container.key(),
            source,
        };
        if fatal {
            self.abort(err);
        } else {
            self.report(err);
        }
    }

    /// Tag gate plus insertion. Returns whether the unit was newly added.
    pub fn accept_unit(&self, unit: R::Unit, origin: &Location) -> bool {
        if let Some(tag) = &self.options().tag_filter {
            if !unit.has_tag(tag) {
                return false;
            }
        }
        self.results.insert(origin, unit)
    }

    pub fn complete(&self, duration: Duration, units: usize) {
        self.send(ScanProgress::Complete {
            duration,
            units,
            error_count: self.errors_reported(),
        });
    }

    fn send(&self, event: ScanProgress) {
        if let Some(tx) = &self.progress {
            // A full channel drops the event rather than stalling the scan.
            let _ = tx.try_send(event);
        }
    }
}
