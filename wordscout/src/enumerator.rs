use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use crate::errors::{SearchError, SearchResult};
use crate::filters::ExtensionFilter;
use crate::search::cancel::CancellationToken;

/// Outcome of a directory walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enumeration {
    /// Matching files in walk order
    pub files: Vec<PathBuf>,
    /// True if the walk stopped early because of cancellation
    pub cancelled: bool,
    /// Entries that could not be read and were skipped
    pub skipped_entries: usize,
}

/// Checks that `root` exists and is a directory
pub fn validate_root(root: &Path) -> SearchResult<()> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(SearchError::not_a_directory(root)),
        Err(e) => match e.kind() {
            std::io::ErrorKind::PermissionDenied => Err(SearchError::permission_denied(root)),
            _ => Err(SearchError::root_not_found(root)),
        },
    }
}

/// Recursively collects the files beneath `root` accepted by `filter`.
///
/// Every directory-level and entry-level error is logged and skipped; the
/// walk itself never fails. Cancellation is checked before each entry is
/// inspected and stops the walk at once, returning what was found so far.
pub fn enumerate(
    root: &Path,
    filter: &ExtensionFilter,
    cancel: &CancellationToken,
) -> Enumeration {
    debug!(
        "Enumerating {} with filter {}",
        root.display(),
        filter.as_str()
    );

    let mut walker = WalkBuilder::new(root);
    walker
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b));

    let mut result = Enumeration::default();

    for entry in walker.build() {
        if cancel.is_cancelled() {
            debug!(
                "Enumeration cancelled after {} files",
                result.files.len()
            );
            result.cancelled = true;
            return result;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping inaccessible entry: {}", e);
                result.skipped_entries += 1;
                continue;
            }
        };

        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        if filter.matches(entry.path()) {
            trace!("Found file: {}", entry.path().display());
            result.files.push(entry.into_path());
        }
    }

    debug!(
        "Enumeration found {} files ({} entries skipped)",
        result.files.len(),
        result.skipped_entries
    );
    result
}
