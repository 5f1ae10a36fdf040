//! Scan configuration.
//!
//! [`ScanOptions`] carries the plain data switches and can be loaded from
//! JSON. [`ScanConfiguration`] adds the two caller callbacks (error handler
//! and accept predicate). A configuration is shared by reference for the
//! whole scan and never mutated once the scan starts.
use crate::error::DiscoveryError;
use crate::model::{ContainerKind, Location, QualifiedName, Tag};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Extension of unit files, without the leading dot.
pub const DEFAULT_UNIT_EXTENSION: &str = "unit";

/// Extension of archive containers, without the leading dot.
pub const DEFAULT_ARCHIVE_EXTENSION: &str = "unit-archive";

/// Namespace prefixes skipped unless the caller overrides the list.
pub const DEFAULT_IGNORED_NAMESPACES: [&str; 4] = ["sun", "com.sun", "jdk.internal", "lombok"];

/// Nested-archive depth limit applied when the caller does not set one.
pub const DEFAULT_MAX_ARCHIVE_DEPTH: u8 = 16;

/// Upper bound on the bytes extracted for one nested archive.
pub const DEFAULT_MAX_NESTED_ARCHIVE_BYTES: u64 = 256 * 1024 * 1024;

/// Sink for recoverable errors. May be invoked concurrently from many tasks.
pub type ErrorHandler = Arc<dyn Fn(&DiscoveryError) + Send + Sync>;

/// Gate evaluated before a container or entry is entered. `false` is a veto:
/// the branch is skipped silently and never reported.
pub type AcceptPredicate = Arc<dyn Fn(&Location, ContainerKind) -> bool + Send + Sync>;

/// Data switches controlling inclusion and exclusion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// When `false`, archive entries outside the target namespace are skipped.
    pub include_all_entries: bool,
    /// When `false`, names containing the anonymous marker are never resolved.
    pub include_anonymous_units: bool,
    /// Resolved units lacking this tag are dropped.
    pub tag_filter: Option<Tag>,
    /// Qualified names starting with any of these are never resolved.
    pub ignore_namespace_prefixes: Vec<String>,
    /// Archives whose location contains any of these terms (case-insensitive)
    /// are skipped by the aggregate sweep and by nested recursion.
    pub ignore_archive_name_terms: Vec<String>,
    pub ignore_nested_archives: bool,
    pub ignore_root_archive: bool,
    pub unit_extension: String,
    pub archive_extensions: Vec<String>,
    pub max_archive_depth: u8,
    /// Nested archives larger than this once extracted are reported and skipped.
    pub max_nested_archive_bytes: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            include_all_entries: true,
            include_anonymous_units: true,
            tag_filter: None,
            ignore_namespace_prefixes: DEFAULT_IGNORED_NAMESPACES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
            ignore_archive_name_terms: Vec::new(),
            ignore_nested_archives: true,
            ignore_root_archive: true,
            unit_extension: DEFAULT_UNIT_EXTENSION.to_string(),
            archive_extensions: vec![DEFAULT_ARCHIVE_EXTENSION.to_string()],
            max_archive_depth: DEFAULT_MAX_ARCHIVE_DEPTH,
            max_nested_archive_bytes: DEFAULT_MAX_NESTED_ARCHIVE_BYTES,
        }
    }
}

impl ScanOptions {
    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, DiscoveryError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, DiscoveryError> {
        let text = fs::read_to_string(path).map_err(|source| DiscoveryError::OptionsIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Stem of `file_name` if it carries the unit extension.
    pub fn unit_stem<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        crate::model::name::strip_extension(file_name, &self.unit_extension)
    }

    pub fn is_unit_name(&self, file_name: &str) -> bool {
        self.unit_stem(file_name).is_some()
    }

    /// Case-insensitive test for any configured archive extension.
    pub fn is_archive_name(&self, file_name: &str) -> bool {
        let lower = file_name.to_ascii_lowercase();
        self.archive_extensions.iter().any(|ext| {
            let ext = ext.to_ascii_lowercase();
            lower.len() > ext.len() + 1
                && lower.ends_with(&ext)
                && lower.as_bytes()[lower.len() - ext.len() - 1] == b'.'
        })
    }

    pub fn is_ignored_namespace(&self, name: &QualifiedName) -> bool {
        name.starts_with_any(&self.ignore_namespace_prefixes)
    }

    /// Case-insensitive substring match of `location` against the ignore terms.
    pub fn is_ignored_archive(&self, location: &str) -> bool {
        let lower = location.to_lowercase();
        self.ignore_archive_name_terms
            .iter()
            .any(|term| lower.contains(&term.to_lowercase()))
    }

    /// Root archives are exempt from the nested-archive and name-term rules
    /// unless `ignore_root_archive` is set.
    pub fn root_exempt(&self, is_root: bool) -> bool {
        is_root && !self.ignore_root_archive
    }

    /// Whether archives nested inside an archive may be entered.
    pub fn may_enter_nested(&self, is_root: bool) -> bool {
        !self.ignore_nested_archives || self.root_exempt(is_root)
    }
}

/// Options plus callbacks for one scan.
#[derive(Clone)]
pub struct ScanConfiguration {
    pub options: ScanOptions,
    error_handler: ErrorHandler,
    accept: AcceptPredicate,
}

impl ScanConfiguration {
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            error_handler: Arc::new(|_| {}),
            accept: Arc::new(|_, _| true),
        }
    }

    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&DiscoveryError) + Send + Sync + 'static,
    {
        self.error_handler = Arc::new(handler);
        self
    }

    pub fn accept<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Location, ContainerKind) -> bool + Send + Sync + 'static,
    {
        self.accept = Arc::new(predicate);
        self
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn report(&self, error: &DiscoveryError) {
        (self.error_handler)(error);
    }

    pub fn accepts(&self, location: &Location, kind: ContainerKind) -> bool {
        (self.accept)(location, kind)
    }

    pub(crate) fn accept_predicate(&self) -> AcceptPredicate {
        Arc::clone(&self.accept)
    }
}

impl Default for ScanConfiguration {
    fn default() -> Self {
        Self::new(ScanOptions::default())
    }
}

impl From<ScanOptions> for ScanConfiguration {
    fn from(options: ScanOptions) -> Self {
        Self::new(options)
    }
}

impl fmt::Debug for ScanConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfiguration")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_defaults() {
        let options = ScanOptions::default();
        assert!(options.include_all_entries);
        assert!(options.include_anonymous_units);
        assert!(options.ignore_nested_archives);
        assert!(options.ignore_root_archive);
        assert!(options.tag_filter.is_none());
        assert!(options.ignore_archive_name_terms.is_empty());
        assert_eq!(options.ignore_namespace_prefixes.len(), 4);
        assert_eq!(options.max_nested_archive_bytes, DEFAULT_MAX_NESTED_ARCHIVE_BYTES);

        let config = ScanConfiguration::default();
        assert!(config.accepts(&Location::directory("/x"), ContainerKind::Directory));
    }

    #[test]
    fn test_json_fills_missing_fields() {
        let options = ScanOptions::from_json_str(
            r#"{ "include_anonymous_units": false, "tag_filter": "component" }"#,
        )
        .unwrap();
        assert!(!options.include_anonymous_units);
        assert_eq!(options.tag_filter, Some(Tag::new("component")));
        assert!(options.include_all_entries);
        assert_eq!(options.unit_extension, DEFAULT_UNIT_EXTENSION);
    }

    #[test]
    fn test_json_rejects_garbage() {
        assert!(matches!(
            ScanOptions::from_json_str("{ not json"),
            Err(DiscoveryError::Options(_))
        ));
    }

    #[test]
    fn test_json_file_missing() {
        let err = ScanOptions::from_json_file(Path::new("/definitely/missing.json")).unwrap_err();
        assert!(matches!(err, DiscoveryError::OptionsIo { .. }));
    }

    #[test]
    fn test_archive_name_matching() {
        let options = ScanOptions::default();
        assert!(options.is_archive_name("extra.unit-archive"));
        assert!(options.is_archive_name("EXTRA.UNIT-ARCHIVE"));
        assert!(!options.is_archive_name("unit-archive"));
        assert!(!options.is_archive_name("extra.unit"));
        assert!(!options.is_archive_name("extraunit-archive"));
    }

    #[test]
    fn test_unit_names() {
        let options = ScanOptions::default();
        assert_eq!(options.unit_stem("X.unit"), Some("X"));
        assert!(!options.is_unit_name("X.unit-archive"));
        assert!(!options.is_unit_name(".unit"));
    }

    #[test]
    fn test_archive_terms_case_insensitive() {
        let options = ScanOptions {
            ignore_archive_name_terms: vec!["Legacy".into()],
            ..ScanOptions::default()
        };
        assert!(options.is_ignored_archive("archive:/lib/old-LEGACY-core.unit-archive"));
        assert!(!options.is_ignored_archive("archive:/lib/core.unit-archive"));
    }

    #[test]
    fn test_nested_flag_combinations() {
        let cases = [
            // (ignore_nested, ignore_root, root may enter, non-root may enter)
            (true, true, false, false),
            (true, false, true, false),
            (false, true, true, true),
            (false, false, true, true),
        ];
        for (ignore_nested, ignore_root, root, non_root) in cases {
            let options = ScanOptions {
                ignore_nested_archives: ignore_nested,
                ignore_root_archive: ignore_root,
                ..ScanOptions::default()
            };
            assert_eq!(options.may_enter_nested(true), root, "{ignore_nested}/{ignore_root}");
            assert_eq!(options.may_enter_nested(false), non_root, "{ignore_nested}/{ignore_root}");
        }
    }

    #[test]
    fn test_error_handler_is_invoked() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let config = ScanConfiguration::default().on_error(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        config.report(&DiscoveryError::InvalidRoot("x".into()));
        config.report(&DiscoveryError::InvalidRoot("y".into()));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
