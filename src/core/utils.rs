use crate::core::errors::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/*-------------------------------------------------------------------------------------------------
  Utilities
-------------------------------------------------------------------------------------------------*/

/*--------------------------------------------------------------------------------------
  File System Helpers
--------------------------------------------------------------------------------------*/

/// `true` when `path` exists and is a regular file.
pub fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}

/// Create `dir` and any missing parents.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|error| Error::persistence(dir, error))
}

/// Replace `path` with the content produced by `fill`.
///
/// The content is written to a temporary file in the destination directory, flushed to disk,
/// and renamed over `path`. Readers observe either the old file or the complete new one.
pub fn replace_file<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> Result<()>,
{
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    ensure_dir(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir).map_err(|error| Error::persistence(dir, error))?;
    fill(temp_file.as_file_mut())?;
    temp_file
        .as_file_mut()
        .flush()
        .and_then(|_| temp_file.as_file().sync_all())
        .map_err(|error| Error::persistence(temp_file.path(), error))?;

    temp_file
        .persist(path)
        .map_err(|error| Error::persistence(path, error.error))?;

    Ok(())
}

/// Replace `path` with `contents`; see [replace_file].
pub fn replace_file_contents(path: &Path, contents: &[u8]) -> Result<()> {
    replace_file(path, |file| {
        file.write_all(contents)
            .map_err(|error| Error::persistence(path, error))
    })
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/
