//! Directory processor: walks a directory tree one level at a time.
//!
//! Each level is listed non-recursively and every entry becomes its own
//! task. Sub-directories recurse with an extended namespace; unit files are
//! resolved as `namespace + "." + stem`. All tasks spawned for a level are
//! joined before that level returns, so the number of live scopes tracks the
//! directory depth.
//!
//! Archives found inside a directory tree are left alone here. Archives that
//! sit on the search path are picked up by the aggregate sweep.
use super::context::ScanContext;
use crate::error::DiscoveryError;
use crate::model::name::join_namespace;
use crate::model::{ContainerKind, Location, QualifiedName};
use crate::resolver::Resolver;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub(crate) struct DirectoryProcessor<'s, 'a, R: Resolver> {
    ctx: &'s ScanContext<'a, R>,
    /// Top-level container the traversal started from.
    origin: &'s Location,
}

impl<'s, 'a, R: Resolver> DirectoryProcessor<'s, 'a, R> {
    pub fn new(ctx: &'s ScanContext<'a, R>, origin: &'s Location) -> Self {
        Self { ctx, origin }
    }

    /// Enumerate `dir` under `namespace`. The caller has already claimed
    /// `dir` and evaluated the accept predicate for it.
    pub fn process(&self, dir: &Path, namespace: &str) {
        if self.ctx.is_aborted() {
            return;
        }
        let container = Location::directory(dir);
        self.ctx.enter(&container);

        let read_dir = match fs::read_dir(dir) {
            Ok(read_dir) => read_dir,
            Err(source) => {
                self.ctx.report(DiscoveryError::DirectoryRead {
                    location: container.key(),
                    source,
                });
                return;
            }
        };

        let mut entries: Vec<PathBuf> = Vec::new();
        for entry in read_dir {
            match entry {
                Ok(entry) => entries.push(entry.path()),
                Err(source) => self.ctx.report(DiscoveryError::DirectoryRead {
                    location: container.key(),
                    source,
                }),
            }
        }

        let container = &container;
        rayon::scope(|s| {
            for path in entries {
                s.spawn(move |_| self.visit(path, namespace, container));
            }
        });
    }

    fn visit(&self, path: PathBuf, namespace: &str, container: &Location) {
        if self.ctx.is_aborted() {
            return;
        }
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return,
        };
        // Follows symlinks; loops are broken by the directory claim below.
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(source) => {
                self.ctx.report(DiscoveryError::DirectoryRead {
                    location: Location::file(&path).key(),
                    source,
                });
                return;
            }
        };
        let options = self.ctx.options();

        if metadata.is_dir() {
            let location = Location::directory(&path);
            if !self.ctx.config.accepts(&location, ContainerKind::Directory) {
                debug!("Vetoed {location}");
                return;
            }
            if !self.ctx.processed.claim(&location.canonicalized()) {
                debug!("Already processed {location}");
                return;
            }
            let child_namespace = join_namespace(namespace, &name);
            self.process(&path, &child_namespace);
            return;
        }

        let (location, kind) = if options.is_archive_name(&name) {
            (Location::archive(&path), ContainerKind::Archive)
        } else {
            (Location::file(&path), ContainerKind::FileLeaf)
        };
        if !self.ctx.config.accepts(&location, kind) {
            debug!("Vetoed {location}");
            return;
        }
        if kind == ContainerKind::Archive {
            return;
        }

        let Some(stem) = options.unit_stem(&name) else {
            return;
        };
        let candidate = QualifiedName::child(namespace, stem);
        if !self.ctx.admits(&candidate) {
            return;
        }
        self.ctx.resolve_candidate(candidate, container, self.origin);
    }
}
