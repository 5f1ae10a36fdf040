//! The ambient search path: an ordered list of directories and archives the
//! engine consults for namespace roots and for the aggregate sweep.
//!
//! The list is injected by the caller. [`SearchPath::from_env`] is a
//! convenience for callers that keep it in a platform path-list variable.
use super::Location;
use crate::config::ScanOptions;
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable read by [`SearchPath::from_default_env`].
pub const DEFAULT_SEARCH_PATH_VAR: &str = "UNITSLEUTH_PATH";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchPath {
    entries: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new<I, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a platform path list (`:`-separated on Unix, `;` on Windows)
    /// from `var`. A missing variable yields an empty search path.
    pub fn from_env(var: &str) -> Self {
        match env::var_os(var) {
            Some(value) => Self::new(env::split_paths(&value).filter(|p| !p.as_os_str().is_empty())),
            None => Self::default(),
        }
    }

    pub fn from_default_env() -> Self {
        Self::from_env(DEFAULT_SEARCH_PATH_VAR)
    }

    pub fn push(&mut self, entry: impl Into<PathBuf>) {
        self.entries.push(entry.into());
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Classified, canonicalised locations in search-path order. Entries that
    /// canonicalise to the same container appear once, at their first position.
    pub fn locations(&self, options: &ScanOptions) -> Vec<Location> {
        let mut seen = HashSet::with_capacity(self.entries.len());
        self.entries
            .iter()
            .map(|entry| Location::inspect(entry, options).canonicalized())
            .filter(|location| seen.insert(location.key()))
            .collect()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.iter().any(|entry| entry == path)
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for SearchPath {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self::new(iter)
    }
}
