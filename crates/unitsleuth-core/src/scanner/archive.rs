//! Archive processor.
//!
//! Opens one archive, lists its entries once and fans out a task per unit
//! entry. Entries that are themselves archives are extracted into memory,
//! claimed under a composite `outer!/entry` key and scanned recursively as
//! non-root archives. The archive reader stays on the task that opened it;
//! spawned tasks only receive entry names or extracted bytes.
use super::context::ScanContext;
use crate::error::DiscoveryError;
use crate::model::name::namespace_path;
use crate::model::{ContainerKind, Location, QualifiedName};
use crate::resolver::Resolver;
use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Read, Seek};
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

/// Versioned overlay directories; never enumerated.
const RESERVED_PREFIX: &str = "meta-inf/versions/";

/// Stem of the module descriptor entry; never resolved.
const MODULE_DESCRIPTOR: &str = "module-info";

/// Entry-path restriction derived from the target namespace(s).
///
/// An empty filter, or one containing the root namespace, matches every
/// entry.
#[derive(Clone, Debug, Default)]
pub(crate) struct NamespaceFilter {
    prefixes: Vec<String>,
    match_all: bool,
}

impl NamespaceFilter {
    pub fn all() -> Self {
        Self {
            prefixes: Vec::new(),
            match_all: true,
        }
    }

    pub fn for_namespace(namespace: &str) -> Self {
        let mut filter = Self::default();
        filter.add(namespace);
        filter
    }

    pub fn add(&mut self, namespace: &str) {
        if namespace.is_empty() {
            self.match_all = true;
            return;
        }
        let mut prefix = namespace_path(namespace);
        prefix.push('/');
        if !self.prefixes.contains(&prefix) {
            self.prefixes.push(prefix);
        }
    }

    pub fn matches(&self, entry: &str) -> bool {
        self.match_all
            || self.prefixes.is_empty()
            || self.prefixes.iter().any(|prefix| entry.starts_with(prefix))
    }
}

pub(crate) struct ArchiveProcessor<'s, 'a, R: Resolver> {
    ctx: &'s ScanContext<'a, R>,
    origin: &'s Location,
    namespaces: &'s NamespaceFilter,
}

impl<'s, 'a, R: Resolver> ArchiveProcessor<'s, 'a, R> {
    pub fn new(
        ctx: &'s ScanContext<'a, R>,
        origin: &'s Location,
        namespaces: &'s NamespaceFilter,
    ) -> Self {
        Self {
            ctx,
            origin,
            namespaces,
        }
    }

    /// Scan the archive at `location`, which the caller has already claimed.
    pub fn process(&self, location: &Location, is_root: bool) {
        if self.ctx.is_aborted() {
            return;
        }
        self.ctx.enter(location);

        match location {
            Location::Archive(path) => {
                let opened = File::open(path)
                    .map_err(ZipError::Io)
                    .and_then(|file| ZipArchive::new(BufReader::new(file)));
                match opened {
                    Ok(mut archive) => self.scan(location, &mut archive, is_root),
                    Err(source) => self.ctx.report(DiscoveryError::ArchiveOpen {
                        location: location.key(),
                        source,
                    }),
                }
            }
            Location::Nested { .. } => {
                let limit = self.ctx.options().max_nested_archive_bytes;
                match read_location_bytes(location, limit) {
                    Ok(bytes) => self.open_in_memory(location, bytes, is_root),
                    Err(source) => self.ctx.report(DiscoveryError::NestedArchiveRead {
                        location: location.key(),
                        source,
                    }),
                }
            }
            Location::Directory(_) | Location::File(_) => {
                debug!("Not an archive: {location}");
            }
        }
    }

    fn open_in_memory(&self, location: &Location, bytes: Vec<u8>, is_root: bool) {
        match ZipArchive::new(Cursor::new(bytes)) {
            Ok(mut archive) => self.scan(location, &mut archive, is_root),
            Err(source) => self.ctx.report(DiscoveryError::ArchiveOpen {
                location: location.key(),
                source,
            }),
        }
    }

    fn scan<Rd>(&self, location: &Location, archive: &mut ZipArchive<Rd>, is_root: bool)
    where
        Rd: Read + Seek + Send,
    {
        let entries: Vec<String> = archive.file_names().map(str::to_owned).collect();
        let options = self.ctx.options();

        rayon::scope(|s| {
            for entry in entries {
                if self.ctx.is_aborted() {
                    break;
                }
                if entry.ends_with('/') || self.is_reserved(&entry) {
                    continue;
                }
                let file_name = entry.rsplit('/').next().unwrap_or(&entry);

                if options.is_unit_name(file_name) {
                    s.spawn(move |_| self.visit_unit(&entry, location));
                } else if options.is_archive_name(file_name) {
                    if let Some((nested, bytes)) = self.prepare_nested(location, archive, &entry, is_root)
                    {
                        s.spawn(move |_| {
                            self.ctx.enter(&nested);
                            self.open_in_memory(&nested, bytes, false);
                        });
                    }
                }
            }
        });
    }

    fn is_reserved(&self, entry: &str) -> bool {
        if entry.to_ascii_lowercase().starts_with(RESERVED_PREFIX) {
            return true;
        }
        let file_name = entry.rsplit('/').next().unwrap_or(entry);
        self.ctx
            .options()
            .unit_stem(file_name)
            .map(|stem| stem == MODULE_DESCRIPTOR)
            .unwrap_or(false)
    }

    fn visit_unit(&self, entry: &str, container: &Location) {
        let options = self.ctx.options();
        if !options.include_all_entries && !self.namespaces.matches(entry) {
            return;
        }
        let Some(name) = QualifiedName::from_entry_path(entry, &options.unit_extension) else {
            return;
        };
        if !self.ctx.admits(&name) {
            return;
        }
        self.ctx.resolve_candidate(name, container, self.origin);
    }

    /// Gate a nested archive entry and extract its bytes. `None` means the
    /// entry is skipped: filtered, vetoed, already claimed or unreadable.
    fn prepare_nested<Rd: Read + Seek>(
        &self,
        outer: &Location,
        archive: &mut ZipArchive<Rd>,
        entry: &str,
        is_root: bool,
    ) -> Option<(Location, Vec<u8>)> {
        let options = self.ctx.options();
        if !options.may_enter_nested(is_root) {
            return None;
        }
        let nested = Location::nested(outer, entry);
        if !options.root_exempt(is_root) && options.is_ignored_archive(&nested.key()) {
            debug!("Ignoring {nested}");
            return None;
        }
        if nested.nesting_depth() > usize::from(options.max_archive_depth) {
            self.ctx.report(DiscoveryError::DepthLimit {
                location: nested.key(),
                limit: options.max_archive_depth,
            });
            return None;
        }
        if !self.ctx.config.accepts(&nested, ContainerKind::Archive) {
            debug!("Vetoed {nested}");
            return None;
        }
        if !self.ctx.processed.claim(&nested) {
            debug!("Already processed {nested}");
            return None;
        }
        match read_entry(archive, entry, options.max_nested_archive_bytes) {
            Ok(bytes) => Some((nested, bytes)),
            Err(source) => {
                self.ctx.report(DiscoveryError::NestedArchiveRead {
                    location: nested.key(),
                    source,
                });
                None
            }
        }
    }
}

/// Extract one entry, reading at most `limit` bytes. The size declared in the
/// entry header is not trusted.
fn read_entry<Rd: Read + Seek>(
    archive: &mut ZipArchive<Rd>,
    entry: &str,
    limit: u64,
) -> io::Result<Vec<u8>> {
    let file = archive.by_name(entry).map_err(io::Error::from)?;
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > limit {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("entry {entry} exceeds {limit} bytes"),
        ));
    }
    Ok(bytes)
}

/// Raw bytes of an archive location, extracting through every nesting level.
fn read_location_bytes(location: &Location, limit: u64) -> io::Result<Vec<u8>> {
    match location {
        Location::Archive(path) => fs::read(path),
        Location::Nested { outer, entry } => {
            let outer_bytes = read_location_bytes(outer, limit)?;
            let mut archive = ZipArchive::new(Cursor::new(outer_bytes)).map_err(io::Error::from)?;
            read_entry(&mut archive, entry, limit)
        }
        Location::Directory(_) | Location::File(_) => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{location} is not an archive"),
        )),
    }
}
