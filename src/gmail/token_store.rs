//! Token cache persistence
//!
//! A single JSON file holding one [`Credential`]. The file is rewritten in
//! full on every save; parent directories are created on demand.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::gmail::auth::Credential;

/// File-backed store for the cached OAuth credential
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Create a store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the token file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached credential, `None` if no token file exists yet
    pub async fn load(&self) -> Result<Option<Credential>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        let credential: Credential = serde_json::from_str(&content)?;
        Ok(Some(credential))
    }

    /// Overwrite the token file with `credential`
    pub async fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(credential)?;
        tokio::fs::write(&self.path, content).await?;

        tracing::info!("Token saved to {}", self.path.display());
        Ok(())
    }
}
