//! On-disk storage for variation reference images.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use shared::domain::UserId;
use tracing::warn;

pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];
const MAX_FILENAME_BYTES: usize = 180;

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Saves an image under a fresh owner-prefixed name.
    ///
    /// Returns `Ok(None)` when the original filename has no allowed
    /// extension; such uploads are ignored rather than rejected.
    pub async fn save(
        &self,
        owner: Option<UserId>,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<Option<String>> {
        let Some(extension) = image_extension(original_filename) else {
            return Ok(None);
        };
        let filename = stored_name(owner, &extension);
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed to create upload dir '{}'", self.root.display()))?;
        tokio::fs::write(self.root.join(&filename), bytes)
            .await
            .with_context(|| format!("failed to write upload '{filename}'"))?;
        Ok(Some(filename))
    }

    /// Copies an existing image for a new owner so later deletions do not
    /// affect the source. Missing sources yield `None`.
    pub async fn copy_for(&self, owner: Option<UserId>, source: &str) -> Result<Option<String>> {
        let Some(extension) = image_extension(source) else {
            return Ok(None);
        };
        let Some(source_path) = self.resolve(source) else {
            return Ok(None);
        };
        if !tokio::fs::try_exists(&source_path).await.unwrap_or(false) {
            return Ok(None);
        }
        let filename = stored_name(owner, &extension);
        tokio::fs::copy(&source_path, self.root.join(&filename))
            .await
            .with_context(|| format!("failed to copy upload '{source}'"))?;
        Ok(Some(filename))
    }

    pub async fn read(&self, filename: &str) -> Result<Option<Vec<u8>>> {
        let Some(path) = self.resolve(filename) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read upload '{filename}'")),
        }
    }

    /// Best-effort removal; failures are logged, never surfaced.
    pub async fn remove(&self, filename: &str) {
        let Some(path) = self.resolve(filename) else {
            return;
        };
        if let Err(error) = tokio::fs::remove_file(&path).await {
            if error.kind() != std::io::ErrorKind::NotFound {
                warn!(%filename, %error, "failed to delete upload");
            }
        }
    }

    /// Maps a stored filename to its path, refusing anything that could
    /// escape the upload directory.
    pub fn resolve(&self, filename: &str) -> Option<PathBuf> {
        if !is_safe_filename(filename) {
            return None;
        }
        Some(self.root.join(filename))
    }
}

pub fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && filename.len() <= MAX_FILENAME_BYTES
        && !filename.contains('/')
        && !filename.contains('\\')
        && !filename.starts_with('.')
}

pub fn image_extension(filename: &str) -> Option<String> {
    let (_, extension) = filename.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    ALLOWED_IMAGE_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

pub fn content_type_for(filename: &str) -> &'static str {
    match image_extension(filename).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

fn stored_name(owner: Option<UserId>, extension: &str) -> String {
    let prefix = match owner {
        Some(user_id) => format!("u{}_", user_id.0),
        None => "public_".to_string(),
    };
    format!("{prefix}img_{}.{extension}", uuid::Uuid::new_v4().simple())
}
