//! Gmail API module
//!
//! Credentials, token persistence, and the client for the handful of Gmail
//! endpoints the tools need.

pub mod auth;
pub mod client;
pub mod labels;
pub mod token_store;
pub mod types;
pub mod utils;

pub use auth::{Credential, CredentialManager, GoogleOAuthProvider, OAuthProvider};
pub use client::GmailClient;
