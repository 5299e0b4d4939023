//! Directory paths and names inside a file share.
//!
//! Callers may use either `/` or `\` as separator. Every path is normalized into a
//! list of non-empty segments; hierarchical create/delete walks that list instead of
//! doing string surgery on the joined path.

use std::fmt;

use crate::error::{FileShareError, Result};

/// Characters the file service refuses in directory and file names.
const FORBIDDEN_CHARS: &[char] = &['"', ':', '|', '<', '>', '*', '?'];

/// A normalized directory path relative to the share root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SharePath {
    segments: Vec<String>,
}

impl SharePath {
    /// The share root (no segments).
    pub fn root() -> Self {
        Self::default()
    }

    /// Normalize a `/` or `\` separated path.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.replace('\\', "/");
        let mut segments = Vec::new();
        for segment in normalized.split('/').filter(|s| !s.is_empty()) {
            validate_segment(segment).map_err(|reason| {
                FileShareError::InvalidPath(format!("{raw:?}: {reason}"))
            })?;
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The first `depth` segments of this path.
    pub fn prefix(&self, depth: usize) -> SharePath {
        SharePath {
            segments: self.segments[..depth.min(self.segments.len())].to_vec(),
        }
    }

    pub fn parent(&self) -> Option<SharePath> {
        if self.is_root() {
            None
        } else {
            Some(self.prefix(self.segments.len() - 1))
        }
    }

    /// Path of the subdirectory `name`. `name` is taken as a single segment.
    pub fn child(&self, name: &str) -> SharePath {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        SharePath { segments }
    }

    /// Every non-root prefix, shortest first: `a`, `a/b`, `a/b/c`.
    pub fn ancestors(&self) -> impl DoubleEndedIterator<Item = SharePath> + '_ {
        (1..=self.segments.len()).map(|depth| self.prefix(depth))
    }

    /// Path of `name` inside this directory, `/`-joined.
    pub fn file_path(&self, name: &str) -> String {
        if self.is_root() {
            name.to_string()
        } else {
            format!("{self}/{name}")
        }
    }
}

impl fmt::Display for SharePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl std::str::FromStr for SharePath {
    type Err = FileShareError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Check a file name: same character rules as directory segments, no separators.
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.contains('/') || name.contains('\\') {
        return Err(FileShareError::InvalidFileName(format!(
            "{name:?}: contains a path separator"
        )));
    }
    validate_segment(name)
        .map_err(|reason| FileShareError::InvalidFileName(format!("{name:?}: {reason}")))
}

/// Lower-case and validate a share name.
///
/// Share names are 3-63 characters of lowercase letters, digits and single hyphens,
/// starting and ending with a letter or digit.
pub fn normalize_share_name(name: &str) -> Result<String> {
    let lower = name.to_lowercase();
    let invalid =
        |reason: &str| Err(FileShareError::InvalidShareName(format!("{name:?}: {reason}")));

    if !(3..=63).contains(&lower.len()) {
        return invalid("must be 3-63 characters long");
    }
    if !lower
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return invalid("only letters, digits and hyphens are allowed");
    }
    if lower.starts_with('-') || lower.ends_with('-') {
        return invalid("must start and end with a letter or digit");
    }
    if lower.contains("--") {
        return invalid("consecutive hyphens are not allowed");
    }
    Ok(lower)
}

fn validate_segment(segment: &str) -> std::result::Result<(), &'static str> {
    if segment.is_empty() {
        return Err("empty name");
    }
    if segment == "." || segment == ".." {
        return Err("relative segments are not allowed");
    }
    if segment
        .chars()
        .any(|c| c.is_control() || FORBIDDEN_CHARS.contains(&c))
    {
        return Err("contains a forbidden character");
    }
    Ok(())
}
