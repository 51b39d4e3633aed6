//! Input unpacking and the schema directory layout.
//!
//! Input is either a zip archive, unpacked into a temporary directory that
//! lives as long as the returned [`UnpackedInput`], or a directory used in place.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::{ExtractError, Result};

/// Directory names inside the input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaLayout {
    /// Schema root, relative to the input
    pub schema_dir: String,
    /// Object schemas, relative to the schema root
    pub objects_dir: String,
}

impl Default for SchemaLayout {
    fn default() -> Self {
        Self {
            schema_dir: "xsd".to_string(),
            objects_dir: "objekty".to_string(),
        }
    }
}

/// An input ready to be read from disk
#[derive(Debug)]
pub struct UnpackedInput {
    base: PathBuf,
    /// Keeps the unpacked archive alive; removed on drop
    _temp_dir: Option<TempDir>,
}

impl UnpackedInput {
    /// Use an existing directory as-is
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            base: path.into(),
            _temp_dir: None,
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn is_temporary(&self) -> bool {
        self._temp_dir.is_some()
    }

    /// Locate the schema root.
    ///
    /// Archives often wrap everything in one top-level folder, so a single
    /// wrapper directory around the schema root is accepted too. Loose files,
    /// hidden entries and `__MACOSX` are ignored when looking for it.
    pub fn schema_root(&self, layout: &SchemaLayout) -> Result<PathBuf> {
        let direct = self.base.join(&layout.schema_dir);
        if direct.is_dir() {
            return Ok(direct);
        }

        let children: Vec<PathBuf> = fs::read_dir(&self.base)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| !is_archiver_metadata(&entry.file_name().to_string_lossy()))
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        if let [wrapper] = children.as_slice() {
            let wrapped = wrapper.join(&layout.schema_dir);
            if wrapped.is_dir() {
                debug!(wrapper = %wrapper.display(), "schema root found inside wrapper directory");
                return Ok(wrapped);
            }
        }

        Err(ExtractError::LayoutNotFound { path: direct })
    }

    /// Locate the object schema directory under the schema root
    pub fn objects_dir(&self, layout: &SchemaLayout) -> Result<PathBuf> {
        let objects = self.schema_root(layout)?.join(&layout.objects_dir);
        if objects.is_dir() {
            Ok(objects)
        } else {
            Err(ExtractError::LayoutNotFound { path: objects })
        }
    }
}

/// Folders archivers add next to the real content
fn is_archiver_metadata(name: &str) -> bool {
    name.starts_with('.') || name == "__MACOSX"
}

/// Open `path` as an input: directories are used in place, anything else is
/// treated as a zip archive and unpacked off the async runtime.
pub async fn open_input(path: &Path) -> Result<UnpackedInput> {
    let metadata = tokio::fs::metadata(path).await?;
    if metadata.is_dir() {
        debug!(path = %path.display(), "using directory input");
        return Ok(UnpackedInput::directory(path));
    }

    let archive_path = path.to_path_buf();
    let unpacked = tokio::task::spawn_blocking(move || unpack_zip(&archive_path))
        .await
        .map_err(|e| ExtractError::Concurrency {
            details: format!("archive task failed: {e}"),
        })??;
    Ok(unpacked)
}

/// Unpack a zip archive into a fresh temporary directory
pub fn unpack_zip(archive_path: &Path) -> Result<UnpackedInput> {
    let temp_dir = tempfile::Builder::new().prefix("xsd-extract-").tempdir()?;
    let count = extract_zip(archive_path, temp_dir.path())?;
    info!(
        archive = %archive_path.display(),
        files = count,
        "archive unpacked"
    );
    Ok(UnpackedInput {
        base: temp_dir.path().to_path_buf(),
        _temp_dir: Some(temp_dir),
    })
}

/// Extract every safe entry of `archive_path` into `dest`; returns the number of files written.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> Result<usize> {
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    let mut count = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        let Some(entry_path) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "skipping archive entry with unsafe path");
            continue;
        };
        let output_path = dest.join(entry_path);

        if entry.is_dir() {
            fs::create_dir_all(&output_path)?;
        } else {
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = fs::File::create(&output_path)?;
            io::copy(&mut entry, &mut outfile)?;
            count += 1;
        }
    }
    Ok(count)
}
