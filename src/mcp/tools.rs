//! MCP Tool definitions and handlers
//!
//! Defines the five inbox tools and routes calls to the Gmail client.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{McpError, Result};
use crate::gmail::client::GmailClient;
use crate::mcp::types::{CallToolResult, Tool};

/// Default page size for `list_unread` and `search`
pub const DEFAULT_MAX_RESULTS: i64 = 20;

fn default_max_results() -> i64 {
    DEFAULT_MAX_RESULTS
}

/// Arguments for `list_unread`
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListUnreadArgs {
    /// Maximum number of messages to return (1-100)
    #[serde(default = "default_max_results", alias = "maxResults")]
    pub max_results: i64,
}

/// Arguments for `search`
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchArgs {
    /// Gmail search query, e.g. `from:someone@example.com is:unread`
    pub query: String,

    /// Maximum number of messages to return (1-100)
    #[serde(default = "default_max_results", alias = "maxResults")]
    pub max_results: i64,
}

/// Arguments for `archive` and `mark_as_read`
#[derive(Debug, Deserialize, JsonSchema)]
pub struct MessageIdsArgs {
    /// Gmail message IDs
    #[serde(alias = "messageIds")]
    pub message_ids: Vec<String>,
}

/// `get_labels` takes no arguments
#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoArgs {}

/// Tool handler
pub struct ToolHandler {
    gmail_client: Option<Arc<GmailClient>>,
}

impl Default for ToolHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolHandler {
    /// Create a tool handler with no Gmail client attached
    pub fn new() -> Self {
        Self { gmail_client: None }
    }

    /// Attach the Gmail client used by every tool
    pub fn attach(&mut self, gmail_client: Arc<GmailClient>) {
        self.gmail_client = Some(gmail_client);
    }

    /// Detach the Gmail client, returning it
    pub fn detach(&mut self) -> Option<Arc<GmailClient>> {
        self.gmail_client.take()
    }

    /// Whether a Gmail client is attached
    pub fn is_attached(&self) -> bool {
        self.gmail_client.is_some()
    }

    fn client(&self) -> Result<&GmailClient> {
        self.gmail_client
            .as_deref()
            .ok_or_else(|| McpError::NotInitialized.into())
    }

    /// List all available tools
    pub fn list_tools(&self) -> Vec<Tool> {
        vec![
            tool_def(
                "list_unread",
                "List unread emails in the inbox",
                input_schema::<ListUnreadArgs>(),
            ),
            tool_def(
                "search",
                "Search emails using Gmail search syntax",
                input_schema::<SearchArgs>(),
            ),
            tool_def(
                "archive",
                "Archive emails (removes them from the inbox and marks them read)",
                input_schema::<MessageIdsArgs>(),
            ),
            tool_def(
                "mark_as_read",
                "Mark emails as read without archiving",
                input_schema::<MessageIdsArgs>(),
            ),
            tool_def(
                "get_labels",
                "List all Gmail labels with message counts",
                input_schema::<NoArgs>(),
            ),
        ]
    }

    /// Call a tool by name
    pub async fn call_tool(&self, name: &str, args: Value) -> CallToolResult {
        let outcome = match name {
            "list_unread" => self.handle_list_unread(args).await,
            "search" => self.handle_search(args).await,
            "archive" => self.handle_archive(args).await,
            "mark_as_read" => self.handle_mark_as_read(args).await,
            "get_labels" => self.handle_get_labels(args).await,
            _ => Err(McpError::UnknownTool {
                name: name.to_string(),
            }
            .into()),
        };

        match outcome {
            Ok(value) => CallToolResult::text(
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
            ),
            Err(e) => {
                tracing::error!("Tool {} failed: {}", name, e);
                CallToolResult::error(e.to_string())
            }
        }
    }

    // ==================== Tool Handlers ====================

    async fn handle_list_unread(&self, args: Value) -> Result<Value> {
        let args: ListUnreadArgs = parse_args(args)?;
        let messages = self.client()?.list_unread(args.max_results).await?;
        Ok(serde_json::to_value(messages)?)
    }

    async fn handle_search(&self, args: Value) -> Result<Value> {
        let args: SearchArgs = parse_args(args)?;
        let messages = self
            .client()?
            .search(&args.query, args.max_results)
            .await?;
        Ok(serde_json::to_value(messages)?)
    }

    async fn handle_archive(&self, args: Value) -> Result<Value> {
        let args: MessageIdsArgs = parse_args(args)?;
        let summary = self.client()?.archive_messages(&args.message_ids).await?;
        Ok(serde_json::to_value(summary)?)
    }

    async fn handle_mark_as_read(&self, args: Value) -> Result<Value> {
        let args: MessageIdsArgs = parse_args(args)?;
        let summary = self.client()?.mark_as_read(&args.message_ids).await?;
        Ok(serde_json::to_value(summary)?)
    }

    async fn handle_get_labels(&self, args: Value) -> Result<Value> {
        let _: NoArgs = parse_args(args)?;
        let labels = self.client()?.list_labels().await?;
        Ok(serde_json::to_value(labels)?)
    }
}

/// Deserialize tool arguments; a missing `arguments` object counts as `{}`
fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| {
        McpError::InvalidArguments {
            message: e.to_string(),
        }
        .into()
    })
}

// ==================== Schema Definitions ====================

fn tool_def(name: &str, description: &str, input_schema: Value) -> Tool {
    Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema,
    }
}

fn input_schema<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    let mut value = serde_json::to_value(schema).unwrap_or_else(|_| json!({}));
    if let Some(object) = value.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
        object.entry("type").or_insert_with(|| json!("object"));
        object
            .entry("properties")
            .or_insert_with(|| json!({}));
    }
    value
}
