//! Container locations and their canonical keys.
//!
//! A [`Location`] names a directory, an archive file, an archive nested
//! inside another archive, or a plain file. Its `Display` form is the
//! canonical string used as the deduplication key in
//! [`crate::scanner::processed::ProcessedSet`].
use crate::config::ScanOptions;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What a location is, as seen by the accept predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    /// A plain file: a unit candidate or something the scan ignores.
    FileLeaf,
    Directory,
    Archive,
}

/// Reference to a container (or a leaf file inside a directory container).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Location {
    Directory(PathBuf),
    Archive(PathBuf),
    /// An archive stored as an entry of another archive.
    Nested {
        outer: Arc<Location>,
        entry: CompactString,
    },
    File(PathBuf),
}

impl Location {
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::Directory(path.into())
    }

    pub fn archive(path: impl Into<PathBuf>) -> Self {
        Self::Archive(path.into())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Composite reference to `entry` inside the archive at `outer`.
    pub fn nested(outer: &Location, entry: &str) -> Self {
        Self::Nested {
            outer: Arc::new(outer.clone()),
            entry: CompactString::new(entry),
        }
    }

    /// Classify `path` by inspecting the filesystem and its extension.
    ///
    /// Existing directories become [`Location::Directory`]; names carrying one
    /// of the configured archive extensions become [`Location::Archive`]
    /// (whether or not the file exists, so a missing archive surfaces as an
    /// open failure later); everything else is a [`Location::File`].
    pub fn inspect(path: &Path, options: &ScanOptions) -> Self {
        if path.is_dir() {
            return Self::Directory(path.to_path_buf());
        }
        let is_archive = path
            .file_name()
            .map(|name| options.is_archive_name(&name.to_string_lossy()))
            .unwrap_or(false);
        if is_archive {
            Self::Archive(path.to_path_buf())
        } else {
            Self::File(path.to_path_buf())
        }
    }

    pub fn kind(&self) -> ContainerKind {
        match self {
            Self::Directory(_) => ContainerKind::Directory,
            Self::Archive(_) | Self::Nested { .. } => ContainerKind::Archive,
            Self::File(_) => ContainerKind::FileLeaf,
        }
    }

    /// Filesystem path, if this location is not nested inside an archive.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Directory(p) | Self::Archive(p) | Self::File(p) => Some(p),
            Self::Nested { .. } => None,
        }
    }

    /// Path of the outermost archive file for nested locations, or the
    /// location's own path otherwise.
    pub fn root_path(&self) -> &Path {
        match self {
            Self::Directory(p) | Self::Archive(p) | Self::File(p) => p,
            Self::Nested { outer, .. } => outer.root_path(),
        }
    }

    /// Number of archive levels between this location and the filesystem.
    pub fn nesting_depth(&self) -> usize {
        match self {
            Self::Nested { outer, .. } => outer.nesting_depth() + 1,
            _ => 0,
        }
    }

    /// Resolve symlinks and relative components so that two spellings of the
    /// same container share one key. Paths that cannot be canonicalised (for
    /// instance because they do not exist) are kept as given.
    pub fn canonicalized(&self) -> Self {
        match self {
            Self::Directory(p) => Self::Directory(canonical_path(p)),
            Self::Archive(p) => Self::Archive(canonical_path(p)),
            Self::File(p) => Self::File(canonical_path(p)),
            Self::Nested { outer, entry } => Self::Nested {
                outer: Arc::new(outer.canonicalized()),
                entry: entry.clone(),
            },
        }
    }

    /// Canonical string form used for deduplication.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory(p) => write!(f, "dir:{}", p.display()),
            Self::Archive(p) => write!(f, "archive:{}", p.display()),
            Self::Nested { outer, entry } => write!(f, "{outer}!/{entry}"),
            Self::File(p) => write!(f, "file:{}", p.display()),
        }
    }
}

fn canonical_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_key_embeds_outer() {
        let outer = Location::archive("/app/lib/outer.unit-archive");
        let nested = Location::nested(&outer, "lib/inner.unit-archive");
        assert_eq!(
            nested.key(),
            "archive:/app/lib/outer.unit-archive!/lib/inner.unit-archive"
        );
        assert_eq!(nested.kind(), ContainerKind::Archive);
        assert_eq!(nested.nesting_depth(), 1);
        assert_eq!(nested.root_path(), Path::new("/app/lib/outer.unit-archive"));
        assert!(nested.path().is_none());
    }

    #[test]
    fn test_inspect_classifies_by_extension() {
        let options = ScanOptions::default();
        let archive = Location::inspect(Path::new("/missing/extra.unit-archive"), &options);
        assert_eq!(archive.kind(), ContainerKind::Archive);
        let other = Location::inspect(Path::new("/missing/readme.txt"), &options);
        assert_eq!(other.kind(), ContainerKind::FileLeaf);
    }

    #[test]
    fn test_inspect_detects_directories() {
        let tmp = tempfile::TempDir::new().unwrap();
        let location = Location::inspect(tmp.path(), &ScanOptions::default());
        assert_eq!(location.kind(), ContainerKind::Directory);
    }

    #[test]
    fn test_canonicalized_merges_spellings() {
        let tmp = tempfile::TempDir::new().unwrap();
        let lib = tmp.path().join("lib");
        std::fs::create_dir(&lib).unwrap();
        let plain = Location::directory(&lib).canonicalized();
        let dotted = Location::directory(lib.join("..").join("lib")).canonicalized();
        assert_eq!(plain.key(), dotted.key());
    }

    #[test]
    fn test_kind_of_each_variant() {
        assert_eq!(Location::directory("/d").kind(), ContainerKind::Directory);
        assert_eq!(Location::archive("/a").kind(), ContainerKind::Archive);
        assert_eq!(Location::file("/f").kind(), ContainerKind::FileLeaf);
    }
}
