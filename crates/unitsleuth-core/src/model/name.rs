//! Qualified unit names and tags.
//!
//! A qualified name is a namespace path joined with `.` (`a.b.X`). Names are
//! derived either from a directory walk (`namespace + "." + stem`) or from an
//! archive entry path (`a/b/X.unit` -> `a.b.X`).
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between namespace segments in a qualified name.
pub const NAMESPACE_SEPARATOR: char = '.';

/// Marker that identifies synthetic (anonymous) units, e.g. `Outer$1`.
pub const ANONYMOUS_MARKER: char = '$';

/// Namespace-qualified unit name, e.g. `a.b.X`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualifiedName(CompactString);

impl QualifiedName {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(CompactString::new(name.as_ref()))
    }

    /// Join a namespace and a single segment. An empty namespace yields the
    /// bare segment rather than a leading separator.
    pub fn child(namespace: &str, segment: &str) -> Self {
        Self(CompactString::new(join_namespace(namespace, segment)))
    }

    /// Derive a name from an archive entry path such as `a/b/X.unit`.
    ///
    /// Returns `None` when the entry does not carry the unit extension or the
    /// stem is empty. Both `/` and `\` are treated as path separators.
    pub fn from_entry_path(path: &str, unit_extension: &str) -> Option<Self> {
        let stem = strip_extension(path, unit_extension)?;
        let stem = stem.trim_start_matches(['/', '\\']);
        if stem.is_empty() || stem.ends_with(['/', '\\']) {
            return None;
        }
        let dotted: String = stem
            .chars()
            .map(|c| if c == '/' || c == '\\' { NAMESPACE_SEPARATOR } else { c })
            .collect();
        Some(Self(CompactString::new(dotted)))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Namespace part (everything before the last separator); empty for
    /// names in the root namespace.
    pub fn namespace(&self) -> &str {
        match self.0.rfind(NAMESPACE_SEPARATOR) {
            Some(pos) => &self.0[..pos],
            None => "",
        }
    }

    /// Last segment of the name.
    pub fn simple_name(&self) -> &str {
        match self.0.rfind(NAMESPACE_SEPARATOR) {
            Some(pos) => &self.0[pos + 1..],
            None => self.0.as_str(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.contains(ANONYMOUS_MARKER)
    }

    /// Raw string-prefix test against each of `prefixes`.
    pub fn starts_with_any<S: AsRef<str>>(&self, prefixes: &[S]) -> bool {
        prefixes
            .iter()
            .any(|prefix| self.0.starts_with(prefix.as_ref()))
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QualifiedName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl AsRef<str> for QualifiedName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Opaque marker a resolved unit may carry. Presence is tested by the unit
/// itself via [`crate::resolver::DiscoveredUnit::has_tag`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(CompactString);

impl Tag {
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(CompactString::new(tag.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// `namespace + "." + segment`, or just `segment` for the root namespace.
pub fn join_namespace(namespace: &str, segment: &str) -> String {
    if namespace.is_empty() {
        segment.to_string()
    } else {
        let mut joined = String::with_capacity(namespace.len() + 1 + segment.len());
        joined.push_str(namespace);
        joined.push(NAMESPACE_SEPARATOR);
        joined.push_str(segment);
        joined
    }
}

/// Map a dotted namespace to its relative path form (`a.b` -> `a/b`).
pub fn namespace_path(namespace: &str) -> String {
    namespace.replace(NAMESPACE_SEPARATOR, "/")
}

/// Strip `.{extension}` from `name`, returning the non-empty stem.
pub fn strip_extension<'a>(name: &'a str, extension: &str) -> Option<&'a str> {
    let stem = name.strip_suffix(extension)?.strip_suffix('.')?;
    if stem.is_empty() {
        None
    } else {
        Some(stem)
    }
}
