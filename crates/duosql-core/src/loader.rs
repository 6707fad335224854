//! SQL file loading with dialect-specific variants.
//!
//! Templates live under a base directory and are addressed by relative
//! path. When a dialect is given, a dialect-suffixed variant
//! (`find.oracle.sql`) wins over the plain file (`find.sql`).

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::Dialect;

/// Errors raised while resolving and reading SQL files.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The file does not exist under the base directory, or the path tried
    /// to escape it.
    #[error("SQL file not found: {path}")]
    NotFound { path: PathBuf },

    /// The file exists but could not be read.
    #[error("failed to read SQL file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Loads SQL templates from a base directory.
#[derive(Debug, Clone)]
pub struct SqlLoader {
    base_path: PathBuf,
}

impl SqlLoader {
    /// Creates a loader rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// The configured base directory.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Reads the file at `path`, relative to the base directory.
    ///
    /// Paths resolving outside the base directory are rejected as
    /// [`LoaderError::NotFound`].
    pub fn load(&self, path: &str) -> Result<String, LoaderError> {
        let base = self
            .base_path
            .canonicalize()
            .map_err(|_| LoaderError::NotFound {
                path: self.base_path.join(path),
            })?;
        let file = base.join(path);
        let file = file.canonicalize().map_err(|_| LoaderError::NotFound {
            path: file.clone(),
        })?;
        if !file.starts_with(&base) || !file.is_file() {
            return Err(LoaderError::NotFound { path: file });
        }
        std::fs::read_to_string(&file).map_err(|source| LoaderError::Io { path: file, source })
    }

    /// Reads `path`, preferring a dialect-suffixed variant.
    ///
    /// `employee/find.sql` with [`Dialect::Mysql`] first tries
    /// `employee/find.mysql.sql`, then falls back to the plain file.
    pub fn load_for_dialect(&self, path: &str, dialect: Dialect) -> Result<String, LoaderError> {
        if let Some(candidate) = dialect_variant(path, dialect) {
            match self.load(&candidate) {
                Ok(sql) => return Ok(sql),
                Err(LoaderError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        self.load(path)
    }
}

fn dialect_variant(path: &str, dialect: Dialect) -> Option<String> {
    let p = Path::new(path);
    let ext = p.extension()?.to_str()?;
    let candidate = p.with_extension(format!("{}.{ext}", dialect.id()));
    candidate.to_str().map(str::to_string)
}
