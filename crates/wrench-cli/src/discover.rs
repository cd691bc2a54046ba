//! Source file discovery for batch runs.

use std::io;
use std::path::{Path, PathBuf};

use wrench_core::SourceFormat;

/// Regular files directly inside `dir` whose extension matches `format`,
/// ignoring case, sorted by path.
pub fn source_files(dir: &Path, format: SourceFormat) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(format.extension()))
            .unwrap_or(false);
        if matches {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
