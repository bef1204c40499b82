//! File-name filtering for the enumeration phase.
//!
//! A filter is a simple file-name glob such as `*.txt`. For convenience a
//! bare extension (`txt` or `.txt`) is accepted and normalised to `*.txt`.
//! Matching is performed against the file name only and ignores ASCII case,
//! so `NOTES.TXT` is picked up by `*.txt`.

use glob::{MatchOptions, Pattern};
use std::fmt;
use std::path::Path;

use crate::errors::{SearchError, SearchResult};

/// Filter used when none is configured
pub const DEFAULT_EXTENSION_FILTER: &str = "*.txt";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compiled file-name filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    pattern: Pattern,
}

impl ExtensionFilter {
    /// Parses a filter expression
    pub fn new(expr: &str) -> SearchResult<Self> {
        let normalized = normalize(expr)?;
        let pattern = Pattern::new(&normalized)
            .map_err(|e| SearchError::invalid_filter(format!("{}: {}", expr, e)))?;
        Ok(Self { pattern })
    }

    /// The glob the filter was compiled from
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// Checks whether the file at `path` passes the filter
    pub fn matches(&self, path: &Path) -> bool {
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => self.pattern.matches_with(name, MATCH_OPTIONS),
            None => false,
        }
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self {
            pattern: Pattern::new(DEFAULT_EXTENSION_FILTER).expect("default filter is valid"),
        }
    }
}

impl fmt::Display for ExtensionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(expr: &str) -> SearchResult<String> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(SearchError::invalid_filter("filter must not be empty"));
    }
    if expr.contains(['/', '\\']) {
        return Err(SearchError::invalid_filter(format!(
            "{}: filter applies to file names, not paths",
            expr
        )));
    }

    if expr.contains(['*', '?', '[']) {
        Ok(expr.to_string())
    } else if let Some(ext) = expr.strip_prefix('.') {
        Ok(format!("*.{}", ext))
    } else {
        Ok(format!("*.{}", expr))
    }
}
