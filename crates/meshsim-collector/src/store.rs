//! On-disk metrics snapshot.
//!
//! The whole `{results, metrics, last_updated}` document is rewritten after
//! every ingested result. Writes go to a sibling temp file first and are
//! renamed into place, so a reader never observes a half-written snapshot.

use std::path::{Path, PathBuf};

use meshsim_common::protocol::MetricsSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("snapshot I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot encoding: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
        move |source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub async fn save(&self, snapshot: &MetricsSnapshot) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(Self::io_err(parent))?;
        }

        let json = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(Self::io_err(&tmp))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(Self::io_err(&self.path))?;
        Ok(())
    }

    /// `Ok(None)` when no snapshot has been written yet.
    pub async fn load(&self) -> Result<Option<MetricsSnapshot>, PersistenceError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::io_err(&self.path)(e)),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
