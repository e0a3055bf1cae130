//! File storage rooted at the served directory.
//!
//! Every path handed in by a client is resolved with [`FileStore::resolve`]
//! first, so reads and writes can never leave the base directory.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested name cannot denote a file under the base directory.
    #[error("invalid file path: {0:?}")]
    InvalidPath(String),

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("storage failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Files under a single base directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a client supplied relative name onto a path below the root.
    ///
    /// Empty and `.` segments are dropped. `..`, backslashes and NUL bytes are
    /// rejected, as is a name with nothing left after dropping.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf, StorageError> {
        let invalid = || StorageError::InvalidPath(rel.to_string());

        let mut path = self.root.clone();
        let mut segments = 0;

        for segment in rel.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(invalid()),
                s if s.contains('\\') || s.contains('\0') => return Err(invalid()),
                s => {
                    path.push(s);
                    segments += 1;
                }
            }
        }

        if segments == 0 {
            return Err(invalid());
        }

        Ok(path)
    }

    /// Reads a whole file.
    ///
    /// Failing to open the file, or finding a directory, is `NotFound`.
    /// A failure while reading an opened file is `Io`.
    pub async fn read(&self, rel: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(rel)?;

        let mut file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "open for read failed");
                return Err(StorageError::NotFound(path));
            }
        };

        let metadata = file
            .metadata()
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        if metadata.is_dir() {
            return Err(StorageError::NotFound(path));
        }

        let mut contents = Vec::with_capacity(usize::try_from(metadata.len()).unwrap_or(0));
        file.read_to_end(&mut contents)
            .await
            .map_err(|e| StorageError::io(&path, e))?;

        Ok(contents)
    }

    /// Creates or truncates a file and writes `contents` in full.
    pub async fn write(&self, rel: &str, contents: &[u8]) -> Result<usize, StorageError> {
        let path = self.resolve(rel)?;

        let mut file = File::create(&path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;

        file.write_all(contents)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        file.flush()
            .await
            .map_err(|e| StorageError::io(&path, e))?;

        Ok(contents.len())
    }
}
