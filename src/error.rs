//! Error types for the Gmail MCP Server
//!
//! Credential failures, Gmail API failures, configuration problems and
//! protocol-level errors all funnel into [`GmailMcpError`].

use thiserror::Error;

/// Main error type for the Gmail MCP Server
#[derive(Error, Debug)]
pub enum GmailMcpError {
    /// OAuth authentication errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Gmail API errors
    #[error("Gmail API error: {0}")]
    Gmail(#[from] GmailApiError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// MCP protocol errors
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl GmailMcpError {
    /// True when the only way forward is running the interactive setup
    pub fn is_auth_required(&self) -> bool {
        matches!(self, GmailMcpError::Auth(AuthError::AuthRequired))
    }
}

/// OAuth authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Gmail authentication required. Run: gmail-mcp --setup")]
    AuthRequired,

    #[error("OAuth credentials file not found: {path}\nDownload it from Google Cloud Console.")]
    CredentialsFileMissing { path: String },

    #[error("Invalid OAuth client secrets: {message}")]
    InvalidClientSecrets { message: String },

    #[error("Cached token does not grant the required scope: {required}")]
    ScopeMismatch { required: String },

    #[error("Failed to refresh access token: {message}")]
    TokenRefreshFailed { message: String },

    #[error("Token exchange failed: {message}")]
    TokenExchangeFailed { message: String },

    #[error("OAuth callback error: {message}")]
    CallbackError { message: String },

    #[error("No authorization code provided")]
    NoAuthCode,
}

/// Gmail API errors
#[derive(Error, Debug)]
pub enum GmailApiError {
    #[error("Message not found: {message_id}")]
    MessageNotFound { message_id: String },

    #[error("Failed to {operation}: {message}")]
    RequestFailed { operation: String, message: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Home directory not found: {path}")]
    DirNotFound { path: String },

    #[error(
        "{var} environment variable is required. \
         Set it to the path of your Google OAuth credentials JSON file."
    )]
    MissingEnvVar { var: String },
}

/// MCP protocol errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Invalid tool arguments: {message}")]
    InvalidArguments { message: String },

    #[error("Gmail client not initialized")]
    NotInitialized,
}

/// Result type alias for Gmail MCP operations
pub type Result<T> = std::result::Result<T, GmailMcpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::CredentialsFileMissing {
            path: "/path/to/credentials.json".to_string(),
        };
        assert!(err.to_string().contains("/path/to/credentials.json"));
    }

    #[test]
    fn test_error_conversion() {
        let auth_err = AuthError::NoAuthCode;
        let gmail_err: GmailMcpError = auth_err.into();
        assert!(matches!(gmail_err, GmailMcpError::Auth(_)));
    }

    #[test]
    fn test_auth_required_detection() {
        let err: GmailMcpError = AuthError::AuthRequired.into();
        assert!(err.is_auth_required());
        assert!(err.to_string().contains("--setup"));

        let other: GmailMcpError = McpError::NotInitialized.into();
        assert!(!other.is_auth_required());
    }

    #[test]
    fn test_request_failed_names_operation() {
        let err = GmailApiError::RequestFailed {
            operation: "list labels".to_string(),
            message: "500 Internal Server Error".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to list labels: 500 Internal Server Error");
    }
}
