use crate::error::{ExtractError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

/// Async discovery of schema files under a directory
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    /// File extensions to include, lowercase
    extensions: Vec<String>,
    /// Maximum depth for directory traversal (None = unlimited)
    max_depth: Option<usize>,
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self {
            extensions: vec!["xsd".to_string()],
            max_depth: None,
        }
    }

    /// Depth 0 is the directory itself; `Some(0)` disables recursion.
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Discover matching files under `path` (file or directory), sorted by path.
    /// Symbolic links are not followed.
    pub async fn discover_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let metadata = fs::metadata(path).await?;

        if metadata.is_file() {
            return Ok(if self.should_process(path) {
                vec![path.to_path_buf()]
            } else {
                Vec::new()
            });
        }

        let mut files = Vec::new();
        let mut read_dir = fs::read_dir(path).await?;

        while let Some(entry) = read_dir.next_entry().await? {
            let entry_path = entry.path();

            if entry_path.is_symlink() {
                continue;
            }

            if let Err(e) = self
                .discover_files_recursive(&entry_path, 0, &mut files)
                .await
            {
                warn!(path = %entry_path.display(), error = %e, "skipping unreadable entry");
            }
        }

        files.sort();
        Ok(files)
    }

    fn discover_files_recursive<'a>(
        &'a self,
        path: &'a Path,
        depth: usize,
        files: &'a mut Vec<PathBuf>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let metadata = fs::metadata(path).await?;

            if metadata.is_file() {
                if self.should_process(path) {
                    files.push(path.to_path_buf());
                }
            } else if metadata.is_dir() {
                if let Some(max_depth) = self.max_depth
                    && depth >= max_depth
                {
                    return Ok(());
                }

                let mut read_dir = fs::read_dir(path).await?;

                while let Some(entry) = read_dir.next_entry().await? {
                    let entry_path = entry.path();

                    if entry_path.is_symlink() {
                        continue;
                    }

                    if let Err(e) = self
                        .discover_files_recursive(&entry_path, depth + 1, files)
                        .await
                    {
                        warn!(path = %entry_path.display(), error = %e, "skipping unreadable entry");
                    }
                }
            }

            Ok(())
        })
    }

    /// Extension check, case-insensitive
    pub fn should_process(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_lowercase()))
    }

    /// Like [`discover_files`](Self::discover_files) but a missing directory is an error
    /// naming the expected location.
    pub async fn discover_in(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !fs::try_exists(dir).await? {
            return Err(ExtractError::LayoutNotFound {
                path: dir.to_path_buf(),
            });
        }
        self.discover_files(dir).await
    }
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new()
    }
}
