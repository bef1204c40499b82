use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::errors::{SearchError, SearchResult};
use crate::results::MatchResult;

/// File name suggested for a saved report
pub const DEFAULT_REPORT_NAME: &str = "Result.txt";

/// Width of the ` File path  : ` label, added to the path length for the rule
const RULE_PADDING: usize = 14;

/// Writes a plain-text report of `results` for `token`.
///
/// ```text
///  Searching word  -  "cat"
/// --------------------------
///  File name  : A.txt
///  File path  : /data/notes
///  Word count : 1
/// ```
pub fn write_report<W: Write>(
    writer: &mut W,
    token: &str,
    results: &[MatchResult],
) -> io::Result<()> {
    writeln!(writer, " Searching word  -  \"{}\"", token)?;
    for result in results {
        let directory = result.directory_path.display().to_string();
        writeln!(writer, "{}", "-".repeat(directory.chars().count() + RULE_PADDING))?;
        writeln!(writer, " File name  : {}", result.file_name)?;
        writeln!(writer, " File path  : {}", directory)?;
        writeln!(writer, " Word count : {}", result.count)?;
    }
    Ok(())
}

/// Writes the report to `path`, replacing any existing file
pub fn save_report(path: &Path, token: &str, results: &[MatchResult]) -> SearchResult<()> {
    let file = File::create(path).map_err(|e| SearchError::from_io(path, e))?;
    let mut writer = BufWriter::new(file);
    write_report(&mut writer, token, results)
        .and_then(|_| writer.flush())
        .map_err(|e| SearchError::from_io(path, e))?;

    info!("Saved report for {} files to {}", results.len(), path.display());
    Ok(())
}
