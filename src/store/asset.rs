//! Site icon replacement.
//!
//! The destination file name is derived from the validated kind only; caller
//! supplied names are used for type detection and nothing else.
//!
//! Icons are staged into a temp file first and only renamed into place by
//! [`StagedAsset::commit`], so a caller can record the asset elsewhere before
//! it becomes visible.

use serde::{Deserialize, Serialize};
use std::{
    io,
    path::{Path, PathBuf},
};
use tracing::{instrument, warn};
use utoipa::ToSchema;

use super::write_staged;

pub const DEFAULT_MAX_BYTES: usize = 100 * 1024;

/// Prefix of the path recorded in the document for stored assets.
const PUBLIC_PREFIX: &str = "public";

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IconKind {
    Ico,
    Png,
}

impl IconKind {
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Ico => "favicon.ico",
            Self::Png => "favicon.png",
        }
    }

    fn from_extension(file_name: &str) -> Option<Self> {
        let (_, ext) = file_name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "ico" => Some(Self::Ico),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .map(str::trim)
            .unwrap_or_default()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/x-icon" | "image/vnd.microsoft.icon" | "image/ico" => Some(Self::Ico),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    /// Resolve the declared type. Extension and content type must agree.
    #[must_use]
    pub fn from_declared(file_name: &str, content_type: &str) -> Option<Self> {
        let by_ext = Self::from_extension(file_name)?;
        let by_mime = Self::from_content_type(content_type)?;
        (by_ext == by_mime).then_some(by_ext)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("only .ico and .png icons are accepted")]
    UnsupportedType,
    #[error("icon is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },
    #[error("no icon file was provided")]
    Empty,
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

impl AssetError {
    /// Rejections are the caller's fault; write failures are ours.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Write { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub kind: IconKind,
    /// Path to record in `site.favicon`, relative to the site root.
    pub relative_path: String,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct AssetReplacer {
    public_dir: PathBuf,
    max_bytes: usize,
}

impl AssetReplacer {
    pub fn new(public_dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            public_dir: public_dir.into(),
            max_bytes,
        }
    }

    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validate an icon and write it to a temp file beside its destination.
    ///
    /// # Errors
    /// Returns a rejection (`UnsupportedType`, `TooLarge`, `Empty`) before touching
    /// storage, or `Write` when persisting fails.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn stage(
        &self,
        bytes: &[u8],
        file_name: &str,
        content_type: &str,
    ) -> Result<StagedAsset, AssetError> {
        let kind =
            IconKind::from_declared(file_name, content_type).ok_or(AssetError::UnsupportedType)?;
        if bytes.is_empty() {
            return Err(AssetError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(AssetError::TooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }

        let destination = self.public_dir.join(kind.file_name());
        let write = |source| AssetError::Write {
            path: destination.clone(),
            source,
        };
        tokio::fs::create_dir_all(&self.public_dir)
            .await
            .map_err(write)?;
        let temp = write_staged(&destination, bytes).await.map_err(write)?;

        Ok(StagedAsset {
            asset: StoredAsset {
                kind,
                relative_path: format!("{PUBLIC_PREFIX}/{}", kind.file_name()),
                size: bytes.len(),
            },
            temp,
            destination,
        })
    }

    /// Validate and store an icon, overwriting any previous icon of that kind.
    ///
    /// # Errors
    /// Same as [`AssetReplacer::stage`].
    pub async fn replace(
        &self,
        bytes: &[u8],
        file_name: &str,
        content_type: &str,
    ) -> Result<StoredAsset, AssetError> {
        self.stage(bytes, file_name, content_type)
            .await?
            .commit()
            .await
    }
}

/// An icon written to disk but not yet visible under its public name.
#[derive(Debug)]
#[must_use = "a staged asset must be committed or discarded"]
pub struct StagedAsset {
    asset: StoredAsset,
    temp: PathBuf,
    destination: PathBuf,
}

impl StagedAsset {
    #[must_use]
    pub fn asset(&self) -> &StoredAsset {
        &self.asset
    }

    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Rename the staged file over the destination.
    ///
    /// # Errors
    /// Returns `AssetError::Write` if the rename fails; the temp file is removed.
    pub async fn commit(self) -> Result<StoredAsset, AssetError> {
        if let Err(source) = tokio::fs::rename(&self.temp, &self.destination).await {
            let _ = tokio::fs::remove_file(&self.temp).await;
            return Err(AssetError::Write {
                path: self.destination,
                source,
            });
        }
        Ok(self.asset)
    }

    /// Drop the staged file, leaving the destination untouched.
    pub async fn discard(self) {
        if let Err(err) = tokio::fs::remove_file(&self.temp).await {
            warn!("failed to remove staged asset {}: {err}", self.temp.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn declared_type_needs_matching_extension_and_mime() {
        assert_eq!(
            IconKind::from_declared("site.ICO", "image/x-icon"),
            Some(IconKind::Ico)
        );
        assert_eq!(
            IconKind::from_declared("icon.png", "image/png; charset=binary"),
            Some(IconKind::Png)
        );
        assert_eq!(IconKind::from_declared("icon.png", "image/x-icon"), None);
        assert_eq!(IconKind::from_declared("icon.gif", "image/gif"), None);
        assert_eq!(IconKind::from_declared("icon", "image/png"), None);
        assert_eq!(IconKind::from_declared("shell.php.png", "text/x-php"), None);
    }

    #[tokio::test]
    async fn stores_icon_under_fixed_name() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let replacer = AssetReplacer::new(dir.path().join("public"), DEFAULT_MAX_BYTES);
        let bytes = vec![7u8; 50 * 1024];

        let stored = replacer
            .replace(&bytes, "../../evil name.ico", "image/x-icon")
            .await?;

        assert_eq!(stored.relative_path, "public/favicon.ico");
        assert_eq!(stored.size, bytes.len());
        let written = tokio::fs::read(dir.path().join("public/favicon.ico")).await?;
        assert_eq!(written, bytes);
        Ok(())
    }

    #[tokio::test]
    async fn rejects_oversized_without_writing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let public = dir.path().join("public");
        let replacer = AssetReplacer::new(&public, DEFAULT_MAX_BYTES);

        let result = replacer
            .replace(&vec![1u8; 200 * 1024], "icon.png", "image/png")
            .await;

        assert!(matches!(result, Err(AssetError::TooLarge { .. })));
        assert!(!public.join("favicon.png").exists());
        Ok(())
    }

    #[tokio::test]
    async fn rejects_wrong_type_and_empty_input() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let replacer = AssetReplacer::new(dir.path(), DEFAULT_MAX_BYTES);

        let wrong = replacer.replace(b"GIF89a", "icon.gif", "image/gif").await;
        assert!(matches!(wrong, Err(AssetError::UnsupportedType)));

        let empty = replacer.replace(b"", "icon.png", "image/png").await;
        assert!(matches!(empty, Err(AssetError::Empty)));
        assert!(empty.is_err_and(|e| e.is_rejection()));
        Ok(())
    }

    #[tokio::test]
    async fn staged_icon_is_invisible_until_committed() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let replacer = AssetReplacer::new(dir.path(), DEFAULT_MAX_BYTES);
        replacer.replace(b"old", "a.png", "image/png").await?;

        let staged = replacer.stage(b"new", "b.png", "image/png").await?;
        assert_eq!(staged.asset().relative_path, "public/favicon.png");
        assert!(staged.temp_path().exists());
        assert_eq!(tokio::fs::read(dir.path().join("favicon.png")).await?, b"old");

        let temp = staged.temp_path().to_path_buf();
        let stored = staged.commit().await?;
        assert_eq!(stored.size, 3);
        assert!(!temp.exists());
        assert_eq!(tokio::fs::read(dir.path().join("favicon.png")).await?, b"new");
        Ok(())
    }

    #[tokio::test]
    async fn discarded_icon_leaves_nothing_behind() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let replacer = AssetReplacer::new(dir.path(), DEFAULT_MAX_BYTES);

        let staged = replacer.stage(b"icon", "a.ico", "image/x-icon").await?;
        staged.discard().await;

        let mut entries = tokio::fs::read_dir(dir.path()).await?;
        assert!(entries.next_entry().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn overwrites_previous_icon_of_same_kind() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let replacer = AssetReplacer::new(dir.path(), DEFAULT_MAX_BYTES);
        replacer.replace(b"first", "a.png", "image/png").await?;
        replacer.replace(b"second", "b.png", "image/png").await?;
        assert_eq!(
            tokio::fs::read(dir.path().join("favicon.png")).await?,
            b"second"
        );
        Ok(())
    }
}
