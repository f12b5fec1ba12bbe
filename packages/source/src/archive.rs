//! Zip archive helpers for the ward boundary download.

use std::path::{Path, PathBuf};

use crate::SourceError;

/// Extracts every entry of a `.zip` archive into `dest`.
///
/// `dest` is cleared first so files from an earlier download never mix
/// with the new ones.
///
/// # Errors
///
/// Returns [`SourceError`] if the archive cannot be opened or extracted.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> Result<(), SourceError> {
    log::info!(
        "Extracting {} -> {}",
        archive_path.display(),
        dest.display()
    );

    if dest.exists() {
        std::fs::remove_dir_all(dest)?;
    }
    std::fs::create_dir_all(dest)?;

    let file = std::fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let entries = archive.len();
    archive.extract(dest)?;

    log::info!("  extracted {entries} entries");
    Ok(())
}

/// Finds the first file under `dir` (searched recursively, in sorted
/// order) whose extension matches `extension`, case-insensitively.
///
/// # Errors
///
/// Returns an I/O error if a directory cannot be read.
pub fn find_with_extension(dir: &Path, extension: &str) -> std::io::Result<Option<PathBuf>> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    entries.sort();

    for path in &entries {
        if path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        {
            return Ok(Some(path.clone()));
        }
    }

    for path in &entries {
        if path.is_dir()
            && let Some(found) = find_with_extension(path, extension)?
        {
            return Ok(Some(found));
        }
    }

    Ok(None)
}
