//! Shared fixtures for the end-to-end discovery tests.
//!
//! `CountingResolver` records how often each name was asked for, so tests
//! can assert not just what was found but what was never resolved at all
//! (vetoed, ignored or anonymous candidates).
#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use unitsleuth_core::{
    DiscoveredUnit, DiscoveryEngine, DiscoveryError, LoaderContext, QualifiedName, ResolveError,
    Resolver, ScanConfiguration, ScanOptions, SearchPath, Tag,
};
use zip::write::FileOptions;
use zip::CompressionMethod;

/// Tag carried by every unit whose simple name starts with `Tagged`.
pub const COMPONENT_TAG: &str = "component";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TestUnit(pub QualifiedName);

impl DiscoveredUnit for TestUnit {
    fn has_tag(&self, tag: &Tag) -> bool {
        tag.as_str() == COMPONENT_TAG && self.0.simple_name().starts_with("Tagged")
    }
}

#[derive(Default)]
pub struct CountingResolver {
    calls: Mutex<HashMap<String, usize>>,
    missing: HashSet<String>,
    link_failures: HashSet<String>,
    fatal: HashSet<String>,
    only: Option<HashSet<String>>,
    released: AtomicUsize,
}

impl CountingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn missing(mut self, name: &str) -> Self {
        self.missing.insert(name.to_string());
        self
    }

    pub fn failing_link(mut self, name: &str) -> Self {
        self.link_failures.insert(name.to_string());
        self
    }

    pub fn fatal_on(mut self, name: &str) -> Self {
        self.fatal.insert(name.to_string());
        self
    }

    /// Resolve only these names; everything else is not found.
    pub fn only(mut self, names: &[&str]) -> Self {
        self.only = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.lock().get(name).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl Resolver for CountingResolver {
    type Unit = TestUnit;

    fn resolve(
        &self,
        name: &QualifiedName,
        _context: &LoaderContext<'_>,
    ) -> Result<TestUnit, ResolveError> {
        *self.calls.lock().entry(name.to_string()).or_insert(0) += 1;

        let key = name.as_str();
        if self.fatal.contains(key) {
            return Err(ResolveError::Unsupported(key.to_string()));
        }
        if self.link_failures.contains(key) {
            return Err(ResolveError::Link {
                name: name.clone(),
                reason: "missing dependency".into(),
            });
        }
        let unknown = self
            .only
            .as_ref()
            .map(|known| !known.contains(key))
            .unwrap_or(false);
        if unknown || self.missing.contains(key) {
            return Err(ResolveError::NotFound(name.clone()));
        }
        Ok(TestUnit(name.clone()))
    }

    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

pub type TestEngine = DiscoveryEngine<Arc<CountingResolver>>;

pub fn engine(resolver: &Arc<CountingResolver>, search_path: &[&PathBuf]) -> TestEngine {
    DiscoveryEngine::with_threads(
        Arc::clone(resolver),
        SearchPath::new(search_path.iter().map(|p| p.as_path())),
        4,
    )
    .unwrap()
}

/// Errors seen by a configuration's handler, as `(kind, message)` pairs.
pub type ErrorLog = Arc<Mutex<Vec<(&'static str, String)>>>;

pub fn collecting(options: ScanOptions) -> (ScanConfiguration, ErrorLog) {
    let log: ErrorLog = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let config = ScanConfiguration::new(options).on_error(move |err| {
        sink.lock().push((error_kind(err), err.to_string()));
    });
    (config, log)
}

pub fn error_kind(err: &DiscoveryError) -> &'static str {
    match err {
        DiscoveryError::DirectoryRead { .. } => "directory_read",
        DiscoveryError::ArchiveOpen { .. } => "archive_open",
        DiscoveryError::NestedArchiveRead { .. } => "nested_archive_read",
        DiscoveryError::Resolution { .. } => "resolution",
        DiscoveryError::Walk { .. } => "walk",
        DiscoveryError::DepthLimit { .. } => "depth_limit",
        DiscoveryError::InvalidRoot(_) => "invalid_root",
        DiscoveryError::EmptySearchPath(_) => "empty_search_path",
        DiscoveryError::Aborted(_) => "aborted",
        DiscoveryError::Pool(_) => "pool",
        DiscoveryError::Spawn(_) => "spawn",
        DiscoveryError::Options(_) => "options",
        DiscoveryError::OptionsIo { .. } => "options_io",
    }
}

pub fn kinds(log: &ErrorLog) -> Vec<&'static str> {
    log.lock().iter().map(|(kind, _)| *kind).collect()
}

/// Sorted qualified names of a result set.
pub fn names<'a>(units: impl IntoIterator<Item = &'a TestUnit>) -> Vec<String> {
    let mut names: Vec<String> = units.into_iter().map(|u| u.0.to_string()).collect();
    names.sort();
    names
}

/// Create an empty unit file at `root/relative`, creating parents.
pub fn write_unit(root: &Path, relative: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, b"unit").unwrap();
    path
}

/// Build an uncompressed archive in memory.
pub fn archive_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, data) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Archive whose entries are all empty unit files.
pub fn unit_archive_bytes(entries: &[&str]) -> Vec<u8> {
    let entries: Vec<(&str, &[u8])> = entries.iter().map(|e| (*e, b"unit".as_slice())).collect();
    archive_bytes(&entries)
}

pub fn write_archive(path: &Path, entries: &[(&str, &[u8])]) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, archive_bytes(entries)).unwrap();
    path.to_path_buf()
}

pub fn write_unit_archive(path: &Path, entries: &[&str]) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, unit_archive_bytes(entries)).unwrap();
    path.to_path_buf()
}

/// Rewrite the last central directory record of `bytes` so its entry
/// declares `declared` uncompressed bytes through a zip64 extra field. The
/// stored data is left untouched.
pub fn with_declared_size(mut bytes: Vec<u8>, declared: u64) -> Vec<u8> {
    let last = |bytes: &[u8], signature: &[u8]| {
        bytes.windows(4).rposition(|window| window == signature).unwrap()
    };
    let central = last(&bytes, b"PK\x01\x02");
    let name_len = u16::from_le_bytes([bytes[central + 28], bytes[central + 29]]);
    let extra_len = u16::from_le_bytes([bytes[central + 30], bytes[central + 31]]);
    bytes[central + 24..central + 28].copy_from_slice(&u32::MAX.to_le_bytes());
    bytes[central + 30..central + 32].copy_from_slice(&(extra_len + 12).to_le_bytes());

    let mut zip64 = vec![0x01, 0x00, 0x08, 0x00];
    zip64.extend_from_slice(&declared.to_le_bytes());
    let at = central + 46 + usize::from(name_len) + usize::from(extra_len);
    bytes.splice(at..at, zip64);

    let end = last(&bytes, b"PK\x05\x06");
    let size = u32::from_le_bytes(bytes[end + 12..end + 16].try_into().unwrap());
    bytes[end + 12..end + 16].copy_from_slice(&(size + 12).to_le_bytes());
    bytes
}

pub fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
