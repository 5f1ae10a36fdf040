//! Scanner module: the discovery engine and its container processors.
//!
//! A scan runs in three phases:
//! - **Plan:** symbolic roots are resolved against the search path into
//!   concrete, canonical container locations. Each one is vetted by the
//!   accept predicate and claimed in the [`ProcessedSet`].
//! - **Dispatch:** one task per claimed container runs the directory or
//!   archive processor on the engine's worker pool. Processors fan out per
//!   entry and join before returning.
//! - **Sweep:** if a directory was dispatched, the archives on the search
//!   path that nobody claimed are scanned as well.
//!
//! Per-scan state lives in a private context that is dropped when the call
//! returns; only the cumulative "loaded units" view outlives it.
pub mod aggregate;
pub mod archive;
mod context;
pub mod directory;
pub mod processed;
pub mod progress;
pub mod report;
pub mod results;
pub mod walk;

use crate::config::ScanConfiguration;
use crate::error::DiscoveryError;
use crate::model::name::namespace_path;
use crate::model::{ContainerKind, Location, QualifiedName, SearchPath};
use crate::resolver::Resolver;
use aggregate::AggregatePathProcessor;
use archive::{ArchiveProcessor, NamespaceFilter};
use chrono::Utc;
use context::ScanContext;
use crossbeam_channel::{Receiver, Sender};
use directory::DirectoryProcessor;
use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info};
use zip::result::ZipError;
use zip::ZipArchive;

pub use processed::ProcessedSet;
pub use progress::ScanProgress;
pub use report::{ScanReport, ScanStats};
pub use results::ResultStore;

/// Maximum number of progress messages that may queue up in the channel of a
/// background scan. Events that do not fit are dropped; the scan never
/// blocks on a slow consumer.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 4_096;

/// Worker threads per logical CPU. Most of the work is waiting on I/O.
const THREADS_PER_CPU: usize = 4;

/// Symbolic starting point of a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Root {
    /// Every search-path container holding the dotted namespace.
    Namespace(String),
    /// The namespace of a reference unit.
    UnitOf(QualifiedName),
    /// A directory tree whose top level is the root namespace.
    Directory(PathBuf),
    /// An explicit list of archive files. Entries that are not archives are
    /// skipped.
    Archives(Vec<PathBuf>),
    /// A concrete container.
    Location(Location),
}

impl From<Location> for Root {
    fn from(location: Location) -> Self {
        Self::Location(location)
    }
}

/// A claimed top-level container waiting for its processor.
struct Dispatch {
    location: Location,
    namespace: String,
}

#[derive(Default)]
struct Plan {
    dispatches: Vec<Dispatch>,
    /// Present once a directory was dispatched; restricts sweep entries when
    /// `include_all_entries` is off.
    sweep: Option<NamespaceFilter>,
}

/// Handle to a discovery running on a background thread.
pub struct DiscoveryHandle<U> {
    /// Receiver for progress updates from the scan.
    pub progress_rx: Receiver<ScanProgress>,
    thread: thread::JoinHandle<HashSet<U>>,
}

impl<U> DiscoveryHandle<U> {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the scan and return its units. A panicked scan yields an
    /// empty set.
    pub fn join(self) -> HashSet<U> {
        self.thread.join().unwrap_or_default()
    }
}

/// Orchestrates scans over a fixed search path with an injected resolver.
pub struct DiscoveryEngine<R: Resolver> {
    resolver: R,
    search_path: SearchPath,
    pool: rayon::ThreadPool,
    /// Every unit discovered since construction or the last `close`.
    loaded: RwLock<HashSet<R::Unit>>,
    closed: AtomicBool,
}

impl<R: Resolver> DiscoveryEngine<R> {
    pub fn new(resolver: R, search_path: SearchPath) -> Result<Self, DiscoveryError> {
        Self::with_threads(resolver, search_path, num_cpus::get() * THREADS_PER_CPU)
    }

    pub fn with_threads(
        resolver: R,
        search_path: SearchPath,
        threads: usize,
    ) -> Result<Self, DiscoveryError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("unitsleuth-worker-{i}"))
            .build()?;
        Ok(Self {
            resolver,
            search_path,
            pool,
            loaded: RwLock::new(HashSet::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    /// Discover every unit reachable from `roots`.
    ///
    /// Never fails: unreadable containers and unresolvable candidates are
    /// reported to the configured handler and skipped. A root that cannot be
    /// resolved at all, or a fatal resolver signal, yields an empty set.
    pub fn discover(&self, roots: &[Root], config: &ScanConfiguration) -> HashSet<R::Unit> {
        self.discover_report(roots, config).units
    }

    pub fn discover_namespace(&self, namespace: &str, config: &ScanConfiguration) -> HashSet<R::Unit> {
        self.discover(&[Root::Namespace(namespace.to_string())], config)
    }

    /// Everything on the search path.
    pub fn discover_all(&self, config: &ScanConfiguration) -> HashSet<R::Unit> {
        self.discover_namespace("", config)
    }

    /// Like [`Self::discover`], also returning the origin grouping and
    /// counters.
    pub fn discover_report(&self, roots: &[Root], config: &ScanConfiguration) -> ScanReport<R::Unit> {
        self.run(roots, config, None)
    }

    /// Walk `path` flat and resolve every unit file and archive under it,
    /// inferring the namespace of loose unit files from their location.
    pub fn load_directory(&self, path: &Path, config: &ScanConfiguration) -> HashSet<R::Unit> {
        self.load_directory_report(path, config).units
    }

    /// [`Self::load_directory`] grouped by the container each unit came from:
    /// the walked root for loose unit files, the archive file otherwise.
    pub fn load_directory_grouped(
        &self,
        path: &Path,
        config: &ScanConfiguration,
    ) -> HashMap<Location, HashSet<R::Unit>> {
        self.load_directory_report(path, config).grouped
    }

    /// Snapshot of every unit discovered since construction or the last
    /// [`Self::close`].
    pub fn loaded_units(&self) -> HashSet<R::Unit> {
        self.loaded.read().clone()
    }

    /// Release resolver handles and clear the cumulative view. Repeated calls
    /// are no-ops until the next scan.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.resolver.release();
        self.loaded.write().clear();
        debug!("Discovery engine closed");
    }

    /// Start a scan on a background thread.
    ///
    /// Returns a handle for receiving progress and joining the result.
    pub fn spawn_discover(
        self: &Arc<Self>,
        roots: Vec<Root>,
        config: ScanConfiguration,
    ) -> Result<DiscoveryHandle<R::Unit>, DiscoveryError>
    where
        R: 'static,
    {
        let (progress_tx, progress_rx) =
            crossbeam_channel::bounded::<ScanProgress>(PROGRESS_CHANNEL_CAPACITY);
        let engine = Arc::clone(self);

        let thread = thread::Builder::new()
            .name("unitsleuth-discovery".into())
            .spawn(move || engine.run(&roots, &config, Some(progress_tx)).units)
            .map_err(DiscoveryError::Spawn)?;

        Ok(DiscoveryHandle {
            progress_rx,
            thread,
        })
    }

    fn run(
        &self,
        roots: &[Root],
        config: &ScanConfiguration,
        progress: Option<Sender<ScanProgress>>,
    ) -> ScanReport<R::Unit> {
        let started_at = Utc::now();
        let start = Instant::now();
        self.closed.store(false, Ordering::SeqCst);
        info!("Starting discovery over {} root(s)", roots.len());

        let ctx = ScanContext::new(config, &self.resolver, progress);
        match self.plan(&ctx, roots) {
            Ok(plan) => self.execute(&ctx, &plan),
            Err(err) => ctx.report(err),
        }
        self.finish(ctx, started_at, start)
    }

    fn load_directory_report(&self, path: &Path, config: &ScanConfiguration) -> ScanReport<R::Unit> {
        let started_at = Utc::now();
        let start = Instant::now();
        self.closed.store(false, Ordering::SeqCst);
        info!("Loading directory {}", path.display());

        let ctx = ScanContext::new(config, &self.resolver, None);
        let root = Location::directory(path).canonicalized();
        if !root.root_path().is_dir() {
            ctx.report(DiscoveryError::InvalidRoot(format!(
                "{} is not a directory",
                path.display()
            )));
        } else if ctx.config.accepts(&root, ContainerKind::Directory) && ctx.processed.claim(&root) {
            self.pool.install(|| walk::load_tree(&ctx, root.root_path()));
        }
        self.finish(ctx, started_at, start)
    }

    /// Resolve the roots into claimed top-level containers.
    fn plan(&self, ctx: &ScanContext<'_, R>, roots: &[Root]) -> Result<Plan, DiscoveryError> {
        let options = ctx.options();
        let mut plan = Plan::default();

        for root in roots {
            let targets: Vec<(Location, String)> = match root {
                Root::Namespace(namespace) => self.resolve_namespace(ctx, namespace)?,
                Root::UnitOf(name) => self.resolve_namespace(ctx, name.namespace())?,
                Root::Directory(path) => {
                    if !path.is_dir() {
                        return Err(DiscoveryError::InvalidRoot(format!(
                            "{} is not a directory",
                            path.display()
                        )));
                    }
                    vec![(Location::directory(path).canonicalized(), String::new())]
                }
                Root::Archives(paths) => paths
                    .iter()
                    .map(|path| Location::inspect(path, options).canonicalized())
                    .filter(|location| location.kind() == ContainerKind::Archive)
                    .map(|location| (location, String::new()))
                    .collect(),
                Root::Location(location) => vec![(location.canonicalized(), String::new())],
            };

            for (location, namespace) in targets {
                let kind = location.kind();
                if kind == ContainerKind::FileLeaf {
                    debug!("Skipping {location}: not a container");
                    continue;
                }
                if !ctx.config.accepts(&location, kind) {
                    debug!("Vetoed {location}");
                    continue;
                }
                if kind == ContainerKind::Directory {
                    plan.sweep
                        .get_or_insert_with(NamespaceFilter::default)
                        .add(&namespace);
                }
                if !ctx.processed.claim(&location) {
                    debug!("Already claimed {location}");
                    continue;
                }
                plan.dispatches.push(Dispatch {
                    location,
                    namespace,
                });
            }
        }
        Ok(plan)
    }

    /// Search-path containers holding `namespace`, with the namespace each
    /// one should be processed under.
    fn resolve_namespace(
        &self,
        ctx: &ScanContext<'_, R>,
        namespace: &str,
    ) -> Result<Vec<(Location, String)>, DiscoveryError> {
        if self.search_path.is_empty() {
            return Err(DiscoveryError::EmptySearchPath(namespace.to_string()));
        }
        let relative = namespace_path(namespace);
        let locations = self.search_path.locations(ctx.options());

        let matched: Vec<Location> = self.pool.install(|| {
            locations
                .into_par_iter()
                .filter_map(|location| self.match_namespace(ctx, location, &relative))
                .collect()
        });
        debug!(
            "Namespace {namespace:?} matched {} container(s)",
            matched.len()
        );
        Ok(matched
            .into_iter()
            .map(|location| (location, namespace.to_string()))
            .collect())
    }

    fn match_namespace(
        &self,
        ctx: &ScanContext<'_, R>,
        location: Location,
        relative: &str,
    ) -> Option<Location> {
        let kind = location.kind();
        if matches!(kind, ContainerKind::Directory | ContainerKind::Archive)
            && !ctx.config.accepts(&location, kind)
        {
            debug!("Vetoed {location}");
            return None;
        }
        match &location {
            Location::Directory(dir) => {
                if relative.is_empty() {
                    return Some(location);
                }
                let candidate = dir.join(relative);
                candidate
                    .is_dir()
                    .then(|| Location::directory(candidate).canonicalized())
            }
            Location::Archive(path) => {
                if relative.is_empty() {
                    return Some(location);
                }
                let prefix = format!("{relative}/");
                let opened = File::open(path)
                    .map_err(ZipError::Io)
                    .and_then(|file| ZipArchive::new(BufReader::new(file)));
                match opened {
                    Ok(archive) => archive
                        .file_names()
                        .any(|entry| entry.starts_with(&prefix))
                        .then_some(location),
                    Err(source) => {
                        // Claimed so the sweep does not report it a second time.
                        ctx.processed.claim(&location);
                        ctx.report(DiscoveryError::ArchiveOpen {
                            location: location.key(),
                            source,
                        });
                        None
                    }
                }
            }
            Location::Nested { .. } | Location::File(_) => None,
        }
    }

    fn execute(&self, ctx: &ScanContext<'_, R>, plan: &Plan) {
        self.pool.install(|| {
            rayon::scope(|s| {
                for dispatch in &plan.dispatches {
                    s.spawn(move |_| Self::dispatch(ctx, dispatch));
                }
            });

            if let Some(filter) = &plan.sweep {
                if !ctx.is_aborted() {
                    AggregatePathProcessor::new(ctx, &self.search_path, filter).process();
                }
            }
        });
    }

    fn dispatch(ctx: &ScanContext<'_, R>, dispatch: &Dispatch) {
        let location = &dispatch.location;
        match location {
            Location::Directory(path) => {
                DirectoryProcessor::new(ctx, location).process(path, &dispatch.namespace);
            }
            Location::Archive(_) | Location::Nested { .. } => {
                let filter = NamespaceFilter::for_namespace(&dispatch.namespace);
                ArchiveProcessor::new(ctx, location, &filter).process(location, true);
            }
            Location::File(_) => {}
        }
    }

    fn finish(
        &self,
        ctx: ScanContext<'_, R>,
        started_at: chrono::DateTime<Utc>,
        start: Instant,
    ) -> ScanReport<R::Unit> {
        let aborted = ctx.is_aborted();
        if aborted {
            ctx.report(DiscoveryError::Aborted(format!(
                "{} resolved unit(s) discarded",
                ctx.results.len()
            )));
        }
        let duration = start.elapsed();
        let mut stats = ScanStats {
            duration,
            containers_processed: ctx.containers_processed(),
            errors_reported: ctx.errors_reported(),
            aborted,
            ..ScanStats::empty(started_at)
        };

        if aborted {
            info!(
                "Discovery aborted after {:?} with {} error(s)",
                duration, stats.errors_reported
            );
            ctx.complete(duration, 0);
            return ScanReport::empty(stats);
        }

        stats.units_discovered = ctx.results.len();
        info!(
            "Discovery finished: {} unit(s) from {} container(s), {} error(s) in {:?}",
            stats.units_discovered, stats.containers_processed, stats.errors_reported, duration
        );
        ctx.complete(duration, stats.units_discovered);

        let (units, grouped) = ctx.results.into_parts();
        self.loaded.write().extend(units.iter().cloned());

        ScanReport {
            units,
            grouped,
            stats,
        }
    }
}

impl<R: Resolver> Drop for DiscoveryEngine<R> {
    fn drop(&mut self) {
        self.close();
    }
}
