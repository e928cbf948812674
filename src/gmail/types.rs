//! Gmail API type definitions
//!
//! These types mirror the Gmail API responses and are used for serialization/deserialization,
//! alongside the flattened shapes handed back to tool callers.

use serde::{Deserialize, Serialize};

/// A Gmail message part (MIME part)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    /// Part ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_id: Option<String>,

    /// MIME type of this part
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Headers for this part
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<Header>,

    /// Body of this part
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<MessagePartBody>,

    /// Nested parts (for multipart messages)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<MessagePart>,
}

impl MessagePart {
    /// Base64url body data, if this part carries any
    pub fn data(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .filter(|d| !d.is_empty())
    }

    /// MIME type, empty when absent
    pub fn mime(&self) -> &str {
        self.mime_type.as_deref().unwrap_or("")
    }
}

/// Header in a message part
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    /// Header name
    pub name: String,

    /// Header value
    pub value: String,
}

/// Body of a message part
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MessagePartBody {
    /// Attachment ID (if this is an attachment)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,

    /// Size in bytes
    #[serde(default)]
    pub size: i64,

    /// Base64url-encoded data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// A Gmail message as returned by `messages.get`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message ID
    pub id: String,

    /// Thread ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Label IDs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub label_ids: Vec<String>,

    /// Snippet (preview text)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,

    /// Message payload (MIME structure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<MessagePart>,
}

/// List of messages response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    /// Messages in this page
    #[serde(default)]
    pub messages: Vec<MessageRef>,

    /// Next page token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,

    /// Result size estimate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_size_estimate: Option<u32>,
}

/// Reference to a message (id and thread_id only)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    /// Message ID
    pub id: String,

    /// Thread ID
    #[serde(default)]
    pub thread_id: String,
}

/// A Gmail label
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    /// Label ID
    pub id: String,

    /// Label name
    pub name: String,

    /// Label type (system or user)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub label_type: Option<String>,

    /// Total message count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages_total: Option<i64>,

    /// Unread message count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages_unread: Option<i64>,

    /// Total thread count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads_total: Option<i64>,

    /// Unread thread count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads_unread: Option<i64>,
}

/// List of labels response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelList {
    /// Labels
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// Request to modify message labels
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyMessageRequest {
    /// Label IDs to add
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_label_ids: Option<Vec<String>>,

    /// Label IDs to remove
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_label_ids: Option<Vec<String>>,
}

// ==================== Flattened results ====================

/// Flattened view of one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDetails {
    pub id: String,
    pub thread_id: Option<String>,
    pub from: String,
    pub to: String,
    pub subject: String,
    /// `YYYY-MM-DD HH:MM`, or the raw header when it does not parse
    pub date: String,
    pub snippet: String,
    pub labels: Vec<String>,
    /// Body text, at most 2000 characters
    pub body_preview: String,
}

/// Flattened view of one label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub label_type: String,
    pub messages_total: Option<i64>,
    pub messages_unread: Option<i64>,
    pub threads_total: Option<i64>,
    pub threads_unread: Option<i64>,
}

impl From<Label> for LabelSummary {
    fn from(label: Label) -> Self {
        Self {
            id: label.id,
            name: label.name,
            label_type: label.label_type.unwrap_or_else(|| "user".to_string()),
            messages_total: label.messages_total,
            messages_unread: label.messages_unread,
            threads_total: label.threads_total,
            threads_unread: label.threads_unread,
        }
    }
}

/// A message a bulk operation could not modify
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedMessage {
    pub id: String,
    pub error: String,
}

/// Per-id outcome of a bulk label mutation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkMutationResult {
    /// Ids modified, in request order
    pub succeeded: Vec<String>,
    /// Ids that failed, in request order
    pub failed: Vec<FailedMessage>,
}

/// Result of the `archive` operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveSummary {
    pub archived_count: usize,
    pub failed_count: usize,
    pub details: ArchiveDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveDetails {
    pub archived: Vec<String>,
    pub failed: Vec<FailedMessage>,
}

impl From<BulkMutationResult> for ArchiveSummary {
    fn from(result: BulkMutationResult) -> Self {
        Self {
            archived_count: result.succeeded.len(),
            failed_count: result.failed.len(),
            details: ArchiveDetails {
                archived: result.succeeded,
                failed: result.failed,
            },
        }
    }
}

/// Result of the `mark_as_read` operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkReadSummary {
    pub marked_count: usize,
    pub failed_count: usize,
    pub details: MarkReadDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkReadDetails {
    pub marked: Vec<String>,
    pub failed: Vec<FailedMessage>,
}

impl From<BulkMutationResult> for MarkReadSummary {
    fn from(result: BulkMutationResult) -> Self {
        Self {
            marked_count: result.succeeded.len(),
            failed_count: result.failed.len(),
            details: MarkReadDetails {
                marked: result.succeeded,
                failed: result.failed,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_deserialize() {
        let json = r#"{
            "id": "18c1",
            "threadId": "18c0",
            "labelIds": ["INBOX", "UNREAD"],
            "snippet": "Hi there",
            "payload": {
                "mimeType": "multipart/alternative",
                "headers": [{"name": "Subject", "value": "Hello"}],
                "body": {"size": 0},
                "parts": [
                    {"partId": "0", "mimeType": "text/plain", "body": {"size": 5, "data": "aGVsbG8="}}
                ]
            }
        }"#;

        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.thread_id.as_deref(), Some("18c0"));
        assert_eq!(message.label_ids, vec!["INBOX", "UNREAD"]);

        let payload = message.payload.unwrap();
        assert!(payload.data().is_none());
        assert_eq!(payload.parts[0].mime(), "text/plain");
        assert_eq!(payload.parts[0].data(), Some("aGVsbG8="));
    }

    #[test]
    fn test_empty_message_list() {
        let list: MessageList = serde_json::from_str(r#"{"resultSizeEstimate": 0}"#).unwrap();
        assert!(list.messages.is_empty());
        assert!(list.next_page_token.is_none());
    }

    #[test]
    fn test_label_summary_defaults_type() {
        let label: Label = serde_json::from_str(r#"{"id": "Label_7", "name": "Receipts"}"#).unwrap();
        let summary = LabelSummary::from(label);
        assert_eq!(summary.label_type, "user");
        assert!(summary.messages_total.is_none());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["type"], "user");
        assert!(json["threads_unread"].is_null());
    }

    #[test]
    fn test_modify_request_omits_empty_side() {
        let request = ModifyMessageRequest {
            add_label_ids: None,
            remove_label_ids: Some(vec!["UNREAD".to_string()]),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"removeLabelIds":["UNREAD"]}"#);
    }

    #[test]
    fn test_archive_summary_shape() {
        let result = BulkMutationResult {
            succeeded: vec!["a".to_string(), "c".to_string()],
            failed: vec![FailedMessage {
                id: "b".to_string(),
                error: "Message not found: b".to_string(),
            }],
        };

        let json = serde_json::to_value(ArchiveSummary::from(result)).unwrap();
        assert_eq!(json["archived_count"], 2);
        assert_eq!(json["failed_count"], 1);
        assert_eq!(json["details"]["archived"][1], "c");
        assert_eq!(json["details"]["failed"][0]["id"], "b");
    }
}
