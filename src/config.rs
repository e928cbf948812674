//! Configuration management for the Gmail MCP Server
//!
//! Resolves the OAuth client-secrets path and the token cache path from
//! environment variables.

use std::path::{Path, PathBuf};

use crate::error::{ConfigError, GmailMcpError, Result};

/// Environment variable holding the OAuth client-secrets path (required)
pub const CREDENTIALS_PATH_VAR: &str = "GMAIL_MCP_CREDENTIALS_PATH";

/// Environment variable overriding the token cache path
pub const TOKEN_PATH_VAR: &str = "GMAIL_MCP_TOKEN_PATH";

/// Configuration for the Gmail MCP Server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Path to OAuth client secrets downloaded from Google Cloud Console
    pub credentials_path: PathBuf,

    /// Path to the cached OAuth token
    pub token_path: PathBuf,
}

impl Config {
    /// Create a configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Create a configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials_path = lookup(CREDENTIALS_PATH_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                GmailMcpError::Config(ConfigError::MissingEnvVar {
                    var: CREDENTIALS_PATH_VAR.to_string(),
                })
            })?;
        let credentials_path = expand_home(Path::new(&credentials_path))?;

        let token_path = match lookup(TOKEN_PATH_VAR).filter(|v| !v.trim().is_empty()) {
            Some(path) => expand_home(Path::new(&path))?,
            None => Self::default_token_path()?,
        };

        Ok(Self {
            credentials_path,
            token_path,
        })
    }

    /// Default token cache location (~/.config/gmail-mcp/token.json)
    pub fn default_token_path() -> Result<PathBuf> {
        Ok(home_dir()?.join(".config").join("gmail-mcp").join("token.json"))
    }
}

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| {
        GmailMcpError::Config(ConfigError::DirNotFound {
            path: "~".to_string(),
        })
    })
}

/// Expand a leading `~` to the user's home directory
fn expand_home(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => Ok(home_dir()?.join(rest)),
        Err(_) => Ok(path.to_path_buf()),
    }
}

/// Gmail API constants
pub mod gmail {
    /// Base URL for Gmail API
    pub const API_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

    /// User ID for the authenticated user
    pub const USER_ID: &str = "me";

    /// Scope needed to read messages and change their labels
    pub const MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

    /// System label IDs
    pub mod labels {
        pub const INBOX: &str = "INBOX";
        pub const UNREAD: &str = "UNREAD";
    }
}
