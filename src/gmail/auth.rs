//! OAuth authentication for Gmail API
//!
//! Handles the credential lifecycle:
//! - Loading the cached token
//! - Refreshing an expired access token
//! - Interactive browser-based authentication (setup mode only)
//!
//! Server mode and setup mode share one state machine in
//! [`CredentialManager::obtain_session`]; they differ only in the
//! `interactive` flag.

use std::collections::HashMap;
use std::future::IntoFuture;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use yup_oauth2::ApplicationSecret;

use crate::config::gmail::MODIFY_SCOPE;
use crate::config::Config;
use crate::error::{AuthError, GmailMcpError, Result};
use crate::gmail::token_store::TokenStore;

/// Google's token endpoint, used when a cached credential does not name one
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Access tokens this close to expiry are treated as expired
const EXPIRY_SKEW_SECS: i64 = 300;

/// Cached OAuth credential
///
/// Serialized in Google's "authorized user" layout so token files written by
/// other Google client libraries load unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Access token
    #[serde(rename = "token")]
    pub access_token: String,

    /// Refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token endpoint used for refreshes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,

    /// OAuth client ID the token was issued to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// OAuth client secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Granted scopes
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Access token expiry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    /// Whether the access token is expired (or about to be) at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry
            .map(|expiry| expiry - Duration::seconds(EXPIRY_SKEW_SECS) <= now)
            .unwrap_or(false)
    }

    /// Whether the credential grants `scope`
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Whether the credential can be used as-is at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && !self.is_expired_at(now) && self.has_scope(MODIFY_SCOPE)
    }

    /// Whether the credential can be used as-is right now
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Whether the credential is expired right now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Token response from OAuth token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    #[serde(default)]
    scope: String,
}

impl TokenResponse {
    fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs))
    }

    fn scopes(&self) -> Vec<String> {
        self.scope.split_whitespace().map(str::to_string).collect()
    }
}

/// The OAuth provider the credential manager talks to
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Exchange the refresh token of `credential` for a fresh access token
    async fn refresh(&self, credential: &Credential) -> Result<Credential>;

    /// Run the browser authorization flow with the given client secrets
    async fn authorize(&self, client_secrets_path: &Path) -> Result<Credential>;
}

/// Outcome of one state in the credential state machine
#[derive(Debug)]
enum Step {
    /// A usable credential was produced
    Ready(Credential),
    /// Fall through to the next state, carrying whatever was loaded
    Next(Option<Credential>),
}

/// Orchestrates cached-token validation, refresh and interactive login
pub struct CredentialManager {
    /// OAuth client secrets file
    credentials_path: PathBuf,

    /// Token cache
    store: TokenStore,

    /// OAuth provider
    provider: Arc<dyn OAuthProvider>,

    /// Last credential handed out
    current: RwLock<Option<Credential>>,
}

impl CredentialManager {
    /// Create a new credential manager
    pub fn new(config: &Config, provider: Arc<dyn OAuthProvider>) -> Self {
        Self {
            credentials_path: config.credentials_path.clone(),
            store: TokenStore::new(config.token_path.clone()),
            provider,
            current: RwLock::new(None),
        }
    }

    /// Produce a usable credential.
    ///
    /// With `interactive == false` this never opens a browser: when neither the
    /// cache nor a refresh yields a valid token it fails with
    /// [`AuthError::AuthRequired`].
    pub async fn obtain_session(&self, interactive: bool) -> Result<Credential> {
        let cached = self.load_cached().await;

        let cached = match Self::check_cached(cached) {
            Step::Ready(credential) => return Ok(credential),
            Step::Next(cached) => cached,
        };

        let step = match cached {
            Some(credential) => self.try_refresh(credential).await,
            None => Step::Next(None),
        };
        match step {
            Step::Ready(credential) => return self.hold(credential).await,
            Step::Next(_) => {}
        }

        if !interactive {
            return Err(AuthError::AuthRequired.into());
        }

        let credential = self.authorize_interactive().await?;
        self.hold(credential).await
    }

    /// Load: in-memory credential first, then the token file.
    /// Unreadable or wrongly scoped tokens count as absent.
    async fn load_cached(&self) -> Option<Credential> {
        if let Some(credential) = self.current.read().await.clone() {
            return Some(credential);
        }

        match self.store.load().await {
            Ok(Some(credential)) if !credential.has_scope(MODIFY_SCOPE) => {
                tracing::warn!(
                    "Failed to load cached credentials: {}",
                    AuthError::ScopeMismatch {
                        required: MODIFY_SCOPE.to_string()
                    }
                );
                None
            }
            Ok(Some(credential)) => {
                tracing::info!("Loaded cached credentials from {}", self.store.path().display());
                Some(credential)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to load cached credentials: {}", e);
                None
            }
        }
    }

    /// Already valid: hand the cached credential straight back
    fn check_cached(cached: Option<Credential>) -> Step {
        match cached {
            Some(credential) if credential.is_valid() => Step::Ready(credential),
            other => Step::Next(other),
        }
    }

    /// Refreshable: one refresh attempt, failures fall through
    async fn try_refresh(&self, credential: Credential) -> Step {
        if !credential.is_expired() || credential.refresh_token.is_none() {
            return Step::Next(Some(credential));
        }

        match self.provider.refresh(&credential).await {
            Ok(refreshed) => {
                if let Err(e) = self.store.save(&refreshed).await {
                    tracing::warn!("Failed to persist refreshed credentials: {}", e);
                }
                tracing::info!("Refreshed expired credentials");
                Step::Ready(refreshed)
            }
            Err(e) => {
                tracing::warn!("Failed to refresh credentials: {}", e);
                Step::Next(None)
            }
        }
    }

    /// Interactive flow: requires the client-secrets file
    async fn authorize_interactive(&self) -> Result<Credential> {
        if !tokio::fs::try_exists(&self.credentials_path).await? {
            return Err(AuthError::CredentialsFileMissing {
                path: self.credentials_path.display().to_string(),
            }
            .into());
        }

        tracing::info!("Starting OAuth flow...");
        let credential = self.provider.authorize(&self.credentials_path).await?;
        self.store.save(&credential).await?;
        tracing::info!(
            "Authentication successful, token saved to {}",
            self.store.path().display()
        );

        Ok(credential)
    }

    async fn hold(&self, credential: Credential) -> Result<Credential> {
        *self.current.write().await = Some(credential.clone());
        Ok(credential)
    }
}

/// Load OAuth client secrets (`installed` or `web` layout)
pub async fn load_client_secrets(path: &Path) -> Result<ApplicationSecret> {
    yup_oauth2::read_application_secret(path)
        .await
        .map_err(|e| {
            GmailMcpError::Auth(AuthError::InvalidClientSecrets {
                message: e.to_string(),
            })
        })
}

/// Redirect URI for the local callback listener.
///
/// Uses the literal address the listener binds; `localhost` may resolve to `::1`.
fn loopback_redirect_uri(port: u16) -> String {
    format!("http://127.0.0.1:{}/", port)
}

/// Google OAuth provider backed by the token endpoint and a loopback redirect
pub struct GoogleOAuthProvider {
    /// HTTP client
    http_client: reqwest::Client,
}

impl GoogleOAuthProvider {
    /// Create a new provider
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
        }
    }

    /// Generate the authorization URL
    pub fn generate_auth_url(secret: &ApplicationSecret, redirect_uri: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            secret.auth_uri,
            urlencoding::encode(&secret.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(MODIFY_SCOPE)
        )
    }

    /// Exchange authorization code for tokens
    async fn exchange_code(
        &self,
        secret: &ApplicationSecret,
        code: &str,
        redirect_uri: &str,
    ) -> Result<Credential> {
        let params = [
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .http_client
            .post(&secret.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GmailMcpError::Auth(AuthError::TokenExchangeFailed {
                message: text,
            }));
        }

        let token_response: TokenResponse = response.json().await?;
        let scopes = match token_response.scopes() {
            scopes if scopes.is_empty() => vec![MODIFY_SCOPE.to_string()],
            scopes => scopes,
        };

        Ok(Credential {
            expiry: token_response.expiry(),
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
            token_uri: Some(secret.token_uri.clone()),
            client_id: Some(secret.client_id.clone()),
            client_secret: Some(secret.client_secret.clone()),
            scopes,
        })
    }

    /// Serve the redirect on `listener` until Google calls back with a code
    async fn wait_for_code(listener: tokio::net::TcpListener) -> Result<String> {
        use axum::{extract::Query, response::Html, routing::get, Router};
        use tokio::sync::oneshot;

        let (tx, rx) = oneshot::channel::<std::result::Result<String, String>>();
        let tx = Arc::new(Mutex::new(Some(tx)));

        let callback_handler = move |Query(params): Query<HashMap<String, String>>| async move {
            let outcome = match (params.get("code"), params.get("error")) {
                (Some(code), _) => Some(Ok(code.clone())),
                (None, Some(error)) => Some(Err(error.clone())),
                (None, None) => None,
            };

            let succeeded = matches!(outcome, Some(Ok(_)));
            if let Some(outcome) = outcome {
                if let Some(sender) = tx.lock().ok().and_then(|mut guard| guard.take()) {
                    let _ = sender.send(outcome);
                }
            }

            if succeeded {
                Html("<html><body><h1>Authentication successful!</h1><p>You can close this window.</p></body></html>")
            } else {
                Html("<html><body><h1>Authentication failed</h1><p>No authorization code received.</p></body></html>")
            }
        };

        let app = Router::new().route("/", get(callback_handler));
        let server = axum::serve(listener, app).into_future();

        tokio::select! {
            result = server => {
                result.map_err(|e| GmailMcpError::Auth(AuthError::CallbackError {
                    message: e.to_string(),
                }))?;
                Err(GmailMcpError::Auth(AuthError::NoAuthCode))
            }
            outcome = rx => {
                match outcome {
                    Ok(Ok(code)) => Ok(code),
                    Ok(Err(error)) => Err(GmailMcpError::Auth(AuthError::CallbackError {
                        message: error,
                    })),
                    Err(_) => Err(GmailMcpError::Auth(AuthError::NoAuthCode)),
                }
            }
        }
    }
}

impl Default for GoogleOAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuthProvider {
    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential.refresh_token.as_deref().ok_or_else(|| {
            GmailMcpError::Auth(AuthError::TokenRefreshFailed {
                message: "No refresh token available".to_string(),
            })
        })?;

        let (client_id, client_secret) = match (&credential.client_id, &credential.client_secret) {
            (Some(id), Some(secret)) => (id.as_str(), secret.as_str()),
            _ => {
                return Err(GmailMcpError::Auth(AuthError::TokenRefreshFailed {
                    message: "Cached token has no OAuth client id/secret".to_string(),
                }))
            }
        };

        let token_uri = credential.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self.http_client.post(token_uri).form(&params).send().await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GmailMcpError::Auth(AuthError::TokenRefreshFailed {
                message: text,
            }));
        }

        let token_response: TokenResponse = response.json().await?;
        let scopes = match token_response.scopes() {
            scopes if scopes.is_empty() => credential.scopes.clone(),
            scopes => scopes,
        };

        Ok(Credential {
            expiry: token_response.expiry(),
            access_token: token_response.access_token,
            refresh_token: token_response
                .refresh_token
                .or_else(|| credential.refresh_token.clone()),
            scopes,
            ..credential.clone()
        })
    }

    async fn authorize(&self, client_secrets_path: &Path) -> Result<Credential> {
        let secret = load_client_secrets(client_secrets_path).await?;

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = loopback_redirect_uri(port);

        let auth_url = Self::generate_auth_url(&secret, &redirect_uri);
        eprintln!("\nPlease visit this URL to authenticate:");
        eprintln!("{}\n", auth_url);

        if let Err(e) = open::that(&auth_url) {
            eprintln!("Could not open browser automatically: {}", e);
            eprintln!("Please open the URL manually.");
        }

        eprintln!("Waiting for authentication callback on port {}...", port);
        let code = Self::wait_for_code(listener).await?;

        eprintln!("Received authorization code, exchanging for tokens...");
        self.exchange_code(&secret, &code, &redirect_uri).await
    }
}
