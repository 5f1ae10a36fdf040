//! Aggregate sweep over the archives of the search path.
//!
//! Runs once per scan, after the dispatched roots have drained, and only when
//! a directory root was observed. Archives already claimed are skipped; the
//! rest are scanned as non-root archives.
use super::archive::{ArchiveProcessor, NamespaceFilter};
use super::context::ScanContext;
use crate::model::{ContainerKind, Location, SearchPath};
use crate::resolver::Resolver;
use tracing::debug;

pub(crate) struct AggregatePathProcessor<'s, 'a, R: Resolver> {
    ctx: &'s ScanContext<'a, R>,
    search_path: &'s SearchPath,
    namespaces: &'s NamespaceFilter,
}

impl<'s, 'a, R: Resolver> AggregatePathProcessor<'s, 'a, R> {
    pub fn new(
        ctx: &'s ScanContext<'a, R>,
        search_path: &'s SearchPath,
        namespaces: &'s NamespaceFilter,
    ) -> Self {
        Self {
            ctx,
            search_path,
            namespaces,
        }
    }

    pub fn process(&self) {
        let options = self.ctx.options();
        let archives: Vec<Location> = self
            .search_path
            .locations(options)
            .into_iter()
            .filter(|location| location.kind() == ContainerKind::Archive)
            .filter(|location| {
                let ignored = options.is_ignored_archive(&location.key());
                if ignored {
                    debug!("Ignoring {location}");
                }
                !ignored
            })
            .collect();
        debug!("Aggregate sweep over {} archive(s)", archives.len());

        rayon::scope(|s| {
            for location in archives {
                if self.ctx.is_aborted() {
                    break;
                }
                if !self.ctx.config.accepts(&location, ContainerKind::Archive) {
                    debug!("Vetoed {location}");
                    continue;
                }
                if !self.ctx.processed.claim(&location) {
                    continue;
                }
                s.spawn(move |_| {
                    ArchiveProcessor::new(self.ctx, &location, self.namespaces).process(&location, false);
                });
            }
        });
    }
}
