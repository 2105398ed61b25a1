//! Durable storage for the site configuration document and its icon asset.
//!
//! Flow Overview:
//! 1) `load` reads and parses the backing file; failures are reported, never defaulted.
//! 2) `update` takes the writer lock, loads, merges a [`ConfigPatch`], validates the
//!    whole merged document, stamps `lastModified` and replaces the file.
//! 3) Replacement is write-to-temp then rename, so readers see either the old or the
//!    new document, never a partial one.

pub mod asset;
pub mod document;
pub mod patch;
pub mod validation;

pub use asset::{AssetError, AssetReplacer, IconKind, StagedAsset, StoredAsset};
pub use document::Document;
pub use patch::ConfigPatch;
pub use validation::FieldError;

use crate::clock::Clock;
use chrono::SecondsFormat;
use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::{debug, instrument};
use ulid::Ulid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to serialize document: {0}")]
    Serialize(serde_json::Error),
    #[error("validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.field.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl StoreError {
    /// Offending fields for validation failures, empty otherwise.
    #[must_use]
    pub fn fields(&self) -> &[FieldError] {
        match self {
            Self::Validation(errors) => errors,
            _ => &[],
        }
    }
}

/// Write `bytes` to a synced temp file next to `path` and return its location.
/// Nothing is left behind on error.
pub(crate) async fn write_staged(path: &Path, bytes: &[u8]) -> io::Result<PathBuf> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", Ulid::new()));

    let result = async {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await
    }
    .await;

    if let Err(err) = result {
        let _ = fs::remove_file(&tmp).await;
        return Err(err);
    }
    Ok(tmp)
}

/// Write `bytes` next to `path` and rename over it.
pub(crate) async fn replace_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = write_staged(path, bytes).await?;
    if let Err(err) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(err);
    }
    Ok(())
}

pub struct ConfigStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    writer: Mutex<()>,
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
            writer: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the current document.
    ///
    /// # Errors
    /// Returns `StoreError::Read` or `StoreError::Parse`.
    pub async fn load(&self) -> Result<Document, StoreError> {
        let bytes = fs::read(&self.path).await.map_err(|source| StoreError::Read {
            path: self.path.clone(),
            source,
        })?;
        Document::from_slice(&bytes).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Apply `patch` as one all-or-nothing read-modify-write.
    ///
    /// A patch that leaves every field as it is performs no write and keeps
    /// `lastModified`.
    ///
    /// # Errors
    /// Returns `StoreError::Validation` with every offending field when the merged
    /// document is invalid (nothing is written), or an I/O/parse error.
    pub async fn update(&self, patch: &ConfigPatch) -> Result<Document, StoreError> {
        self.write(patch, false).await
    }

    /// Like [`ConfigStore::update`], but always writes and stamps `lastModified`,
    /// even when no field changes. Used when a file the document points at was
    /// replaced.
    ///
    /// # Errors
    /// Same as [`ConfigStore::update`].
    pub async fn touch(&self, patch: &ConfigPatch) -> Result<Document, StoreError> {
        self.write(patch, true).await
    }

    #[instrument(skip_all, fields(path = %self.path.display(), force = force))]
    async fn write(&self, patch: &ConfigPatch, force: bool) -> Result<Document, StoreError> {
        let _guard = self.writer.lock().await;

        let current = self.load().await?;
        let mut next = patch.apply(&current);
        if next == current && !force {
            debug!("patch is a no-op, skipping write");
            return Ok(current);
        }

        let errors = validation::validate(&next);
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }

        next.last_modified = Some(
            self.clock
                .now()
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        );

        let bytes = next.to_pretty_json().map_err(StoreError::Serialize)?;
        replace_file(&self.path, &bytes)
            .await
            .map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })?;

        debug!("configuration document replaced");
        Ok(next)
    }
}
