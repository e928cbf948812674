//! Gmail MCP Server Library
//!
//! A Model Context Protocol (MCP) server that lets an assistant triage a Gmail
//! inbox: list unread mail, search, archive, mark as read, and list labels.

pub mod config;
pub mod error;
pub mod gmail;
pub mod mcp;

pub use config::Config;
pub use error::{GmailMcpError, Result};
