//! Flat parallel walk used by the directory-load calls.
//!
//! Unlike the namespace-driven [`super::directory`] processor, this walker
//! does not know the namespace of the tree it is given. It visits every file
//! with `jwalk`, infers candidate names for loose unit files from their path
//! relative to the root (longest first), and hands every archive file to the
//! archive processor as a root archive.
//!
//! The accept predicate is applied inside jwalk's `process_read_dir` hook so
//! vetoed directories are never read.
use super::archive::{ArchiveProcessor, NamespaceFilter};
use super::context::ScanContext;
use crate::config::ScanOptions;
use crate::error::DiscoveryError;
use crate::model::{Location, QualifiedName};
use crate::resolver::Resolver;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Walk `root` and resolve everything found under it.
pub(crate) fn load_tree<R: Resolver>(ctx: &ScanContext<'_, R>, root: &Path) {
    let origin = Location::directory(root);
    ctx.enter(&origin);

    let accept = ctx.config.accept_predicate();
    let options = ctx.options().clone();
    let walker = jwalk::WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(false)
        .parallelism(jwalk::Parallelism::RayonNewPool(num_cpus::get()))
        .process_read_dir(move |_depth, _path, _state, children| {
            children.retain(|child| match child {
                Ok(entry) => {
                    let path = entry.path();
                    let location = if entry.file_type().is_dir() {
                        Location::directory(path)
                    } else {
                        Location::inspect(&path, &options)
                    };
                    accept(&location, location.kind())
                }
                Err(_) => true,
            });
        });

    let mut units: Vec<PathBuf> = Vec::new();
    let mut archives: Vec<Location> = Vec::new();
    for entry_result in walker {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_default();
                ctx.report(DiscoveryError::Walk {
                    path,
                    message: format!("{err}"),
                });
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        let options = ctx.options();
        if options.is_unit_name(&file_name) {
            units.push(entry.path());
        } else if options.is_archive_name(&file_name) {
            archives.push(Location::archive(entry.path()).canonicalized());
        }
    }
    debug!(
        "Walk of {} found {} unit file(s), {} archive(s)",
        root.display(),
        units.len(),
        archives.len()
    );

    let origin = &origin;
    let all_entries = NamespaceFilter::all();
    let all_entries = &all_entries;
    rayon::scope(|s| {
        for path in units {
            s.spawn(move |_| load_unit_file(ctx, root, &path, origin));
        }
        for archive in archives {
            if ctx.is_aborted() {
                break;
            }
            if !ctx.processed.claim(&archive) {
                continue;
            }
            s.spawn(move |_| {
                ArchiveProcessor::new(ctx, &archive, all_entries).process(&archive, true);
            });
        }
    });
}

/// Try each inferred name in turn; the first one the resolver accepts wins.
fn load_unit_file<R: Resolver>(ctx: &ScanContext<'_, R>, root: &Path, path: &Path, origin: &Location) {
    if ctx.is_aborted() {
        return;
    }
    let container = match path.parent() {
        Some(parent) => Location::directory(parent),
        None => origin.clone(),
    };
    let candidates: Vec<QualifiedName> = inferred_names(root, path, ctx.options())
        .into_iter()
        .filter(|name| ctx.admits(name))
        .collect();

    let mut last_failure = None;
    for name in candidates {
        match ctx.try_resolve(&name, &container, origin) {
            Ok(unit) => {
                ctx.accept_unit(unit, origin);
                return;
            }
            Err(err) if err.is_fatal() => {
                ctx.resolution_failed(name, &container, err);
                return;
            }
            Err(err) => {
                // Keep the failure of the most qualified candidate.
                if last_failure.is_none() {
                    last_failure = Some((name, err));
                }
            }
        }
    }
    if let Some((name, err)) = last_failure {
        ctx.resolution_failed(name, &container, err);
    }
}

/// Candidate names for a loose unit file, most qualified first:
/// `root/a/b/X.unit` yields `a.b.X`, `b.X`, `X`.
pub(crate) fn inferred_names(root: &Path, path: &Path, options: &ScanOptions) -> Vec<QualifiedName> {
    let Some(file_name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return Vec::new();
    };
    let Some(stem) = options.unit_stem(&file_name) else {
        return Vec::new();
    };

    let segments: Vec<String> = path
        .parent()
        .and_then(|parent| parent.strip_prefix(root).ok())
        .map(|relative| {
            relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();

    (0..=segments.len())
        .map(|skip| {
            let namespace = segments[skip..].join(".");
            QualifiedName::child(&namespace, stem)
        })
        .collect()
}
