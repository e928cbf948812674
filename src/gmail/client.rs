//! Gmail API client
//!
//! The mail gateway: listing, searching, archiving and marking messages read.
//! Every operation obtains a non-interactive session first, so an expired
//! and unrefreshable token surfaces as `AuthRequired` before any Gmail call.

use std::sync::Arc;

use crate::config::gmail::{labels, API_BASE_URL, USER_ID};
use crate::error::{GmailApiError, GmailMcpError, Result};
use crate::gmail::auth::CredentialManager;
use crate::gmail::labels::LabelManager;
use crate::gmail::types::*;
use crate::gmail::utils::{clamp_max_results, flatten_message};

/// Which messages a listing call selects
enum MessageFilter<'a> {
    Labels(&'a [&'a str]),
    Query(&'a str),
}

/// Gmail API client
pub struct GmailClient {
    /// HTTP client
    http_client: reqwest::Client,

    /// Gmail REST base, `https://gmail.googleapis.com/gmail/v1` in production
    api_base: String,

    /// Source of access tokens
    credentials: Arc<CredentialManager>,
}

impl GmailClient {
    /// Create a new Gmail client
    pub fn new(credentials: Arc<CredentialManager>) -> Self {
        Self::with_api_base(credentials, API_BASE_URL)
    }

    /// Create a client talking to a different Gmail REST base URL
    pub fn with_api_base(credentials: Arc<CredentialManager>, api_base: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Get a valid access token without ever prompting
    async fn access_token(&self) -> Result<String> {
        let credential = self.credentials.obtain_session(false).await?;
        Ok(credential.access_token)
    }

    /// Base URL for messages
    fn messages_url(&self) -> String {
        format!("{}/users/{}/messages", self.api_base, USER_ID)
    }

    // ==================== Message Operations ====================

    /// List unread messages in the inbox
    pub async fn list_unread(&self, max_results: i64) -> Result<Vec<MessageDetails>> {
        let token = self.access_token().await?;
        let filter = MessageFilter::Labels(&[labels::INBOX, labels::UNREAD]);
        self.collect_messages(&token, filter, max_results, "list messages")
            .await
    }

    /// Search messages with Gmail query syntax
    pub async fn search(&self, query: &str, max_results: i64) -> Result<Vec<MessageDetails>> {
        let token = self.access_token().await?;
        self.collect_messages(&token, MessageFilter::Query(query), max_results, "search messages")
            .await
    }

    /// List matching ids page by page, then fetch each message in turn
    async fn collect_messages(
        &self,
        token: &str,
        filter: MessageFilter<'_>,
        max_results: i64,
        operation: &str,
    ) -> Result<Vec<MessageDetails>> {
        let limit = clamp_max_results(max_results) as usize;
        let ids = match self.list_message_ids(token, &filter, limit).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!("Gmail API error: failed to {}: {}", operation, e);
                return Err(e);
            }
        };

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            results.push(self.fetch_message_details(token, &id).await?);
        }

        Ok(results)
    }

    /// Collect up to `limit` message ids, following `nextPageToken`
    async fn list_message_ids(
        &self,
        token: &str,
        filter: &MessageFilter<'_>,
        limit: usize,
    ) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let remaining = (limit - ids.len()).to_string();
            let mut query: Vec<(&str, &str)> = vec![("maxResults", remaining.as_str())];
            match filter {
                MessageFilter::Labels(label_ids) => {
                    query.extend(label_ids.iter().map(|label| ("labelIds", *label)));
                }
                MessageFilter::Query(q) => query.push(("q", *q)),
            }
            if let Some(ref page) = page_token {
                query.push(("pageToken", page.as_str()));
            }

            let response = self
                .http_client
                .get(self.messages_url())
                .bearer_auth(token)
                .query(&query)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(GmailMcpError::Gmail(GmailApiError::RequestFailed {
                    operation: "list messages".to_string(),
                    message: format!("({}): {}", status, text),
                }));
            }

            let page: MessageList = response.json().await?;
            ids.extend(page.messages.into_iter().map(|m| m.id));

            match page.next_page_token {
                Some(next) if ids.len() < limit => page_token = Some(next),
                _ => break,
            }
        }

        ids.truncate(limit);
        Ok(ids)
    }

    /// Get a message by ID
    pub async fn get_message(&self, token: &str, message_id: &str) -> Result<Message> {
        let url = format!("{}/{}", self.messages_url(), message_id);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .query(&[("format", "full")])
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else if response.status().as_u16() == 404 {
            Err(GmailMcpError::Gmail(GmailApiError::MessageNotFound {
                message_id: message_id.to_string(),
            }))
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            Err(GmailMcpError::Gmail(GmailApiError::RequestFailed {
                operation: "get message".to_string(),
                message: format!("({}): {}", status, text),
            }))
        }
    }

    /// Fetch one message and flatten it
    pub async fn fetch_message_details(&self, token: &str, message_id: &str) -> Result<MessageDetails> {
        let message = self.get_message(token, message_id).await?;
        Ok(flatten_message(message))
    }

    /// Remove labels from one message
    pub async fn modify_message(
        &self,
        token: &str,
        message_id: &str,
        remove_label_ids: &[&str],
    ) -> Result<()> {
        let url = format!("{}/{}/modify", self.messages_url(), message_id);

        let request = ModifyMessageRequest {
            add_label_ids: None,
            remove_label_ids: Some(remove_label_ids.iter().map(|l| l.to_string()).collect()),
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else if response.status().as_u16() == 404 {
            Err(GmailMcpError::Gmail(GmailApiError::MessageNotFound {
                message_id: message_id.to_string(),
            }))
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            Err(GmailMcpError::Gmail(GmailApiError::RequestFailed {
                operation: format!("modify message {}", message_id),
                message: format!("({}): {}", status, text),
            }))
        }
    }

    // ==================== Bulk Operations ====================

    /// Archive messages by removing INBOX and UNREAD
    pub async fn archive_messages(&self, message_ids: &[String]) -> Result<ArchiveSummary> {
        let token = self.access_token().await?;
        let result = self
            .remove_labels_each(&token, message_ids, &[labels::INBOX, labels::UNREAD], "archive")
            .await;
        Ok(result.into())
    }

    /// Mark messages as read without archiving
    pub async fn mark_as_read(&self, message_ids: &[String]) -> Result<MarkReadSummary> {
        let token = self.access_token().await?;
        let result = self
            .remove_labels_each(&token, message_ids, &[labels::UNREAD], "mark as read")
            .await;
        Ok(result.into())
    }

    /// Apply one label removal per id; a failure is recorded and the loop moves on
    async fn remove_labels_each(
        &self,
        token: &str,
        message_ids: &[String],
        remove_label_ids: &[&str],
        action: &str,
    ) -> BulkMutationResult {
        let mut result = BulkMutationResult::default();

        for message_id in message_ids {
            match self.modify_message(token, message_id, remove_label_ids).await {
                Ok(()) => {
                    tracing::info!("{}: {}", action, message_id);
                    result.succeeded.push(message_id.clone());
                }
                Err(e) => {
                    tracing::error!("Failed to {} {}: {}", action, message_id, e);
                    result.failed.push(FailedMessage {
                        id: message_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        result
    }

    // ==================== Label Operations ====================

    /// List all labels
    pub async fn list_labels(&self) -> Result<Vec<LabelSummary>> {
        let token = self.access_token().await?;
        let manager = LabelManager::new(&self.http_client, &self.api_base, &token);
        manager.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;

    use crate::config::gmail::MODIFY_SCOPE;
    use crate::config::Config;
    use crate::gmail::auth::{Credential, GoogleOAuthProvider};
    use crate::gmail::token_store::TokenStore;

    const MESSAGES_PATH: &str = "/gmail/v1/users/me/messages";

    struct Harness {
        _dir: tempfile::TempDir,
        server: ServerGuard,
        client: GmailClient,
    }

    async fn harness(with_token: bool) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            credentials_path: dir.path().join("client_secret.json"),
            token_path: dir.path().join("token.json"),
        };

        if with_token {
            let credential = Credential {
                access_token: "test-token".to_string(),
                refresh_token: None,
                token_uri: None,
                client_id: None,
                client_secret: None,
                scopes: vec![MODIFY_SCOPE.to_string()],
                expiry: Some(Utc::now() + Duration::hours(1)),
            };
            TokenStore::new(&config.token_path)
                .save(&credential)
                .await
                .unwrap();
        }

        let server = Server::new_async().await;
        let manager = CredentialManager::new(&config, Arc::new(GoogleOAuthProvider::new()));
        let client = GmailClient::with_api_base(
            Arc::new(manager),
            format!("{}/gmail/v1", server.url()),
        );

        Harness {
            _dir: dir,
            server,
            client,
        }
    }

    fn full_message(id: &str, subject: &str) -> String {
        json!({
            "id": id,
            "threadId": format!("t-{id}"),
            "labelIds": ["INBOX", "UNREAD"],
            "snippet": format!("snippet {id}"),
            "payload": {
                "mimeType": "text/plain",
                "headers": [
                    {"name": "Subject", "value": subject},
                    {"name": "From", "value": "sender@example.com"},
                    {"name": "Date", "value": "Tue, 14 Nov 2023 09:05:33 +0000"}
                ],
                "body": {"size": 4, "data": "Ym9keQ=="}
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_list_unread_fetches_each_message() {
        let mut h = harness(true).await;
        let list = h
            .server
            .mock("GET", MESSAGES_PATH)
            .match_header("authorization", "Bearer test-token")
            .match_query(Matcher::AllOf(vec![
                Matcher::Regex("labelIds=INBOX&labelIds=UNREAD".into()),
                Matcher::UrlEncoded("maxResults".into(), "1".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"messages":[{"id":"m1","threadId":"t-m1"}],"resultSizeEstimate":1}"#)
            .create_async()
            .await;
        let get = h
            .server
            .mock("GET", format!("{MESSAGES_PATH}/m1").as_str())
            .match_query(Matcher::UrlEncoded("format".into(), "full".into()))
            .with_header("content-type", "application/json")
            .with_body(full_message("m1", "Hello"))
            .expect(1)
            .create_async()
            .await;

        let messages = h.client.list_unread(0).await.unwrap();

        list.assert_async().await;
        get.assert_async().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].subject, "Hello");
        assert_eq!(messages[0].date, "2023-11-14 09:05");
        assert_eq!(messages[0].body_preview, "body");
    }

    #[tokio::test]
    async fn test_list_unread_empty_inbox() {
        let mut h = harness(true).await;
        h.server
            .mock("GET", MESSAGES_PATH)
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"{"resultSizeEstimate":0}"#)
            .create_async()
            .await;

        let messages = h.client.list_unread(20).await.unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_search_passes_query_and_follows_pages() {
        let mut h = harness(true).await;
        let first = h
            .server
            .mock("GET", MESSAGES_PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "from:boss@example.com is:unread".into()),
                Matcher::UrlEncoded("maxResults".into(), "2".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"messages":[{"id":"m1","threadId":"t"}],"nextPageToken":"p2"}"#)
            .create_async()
            .await;
        let second = h
            .server
            .mock("GET", MESSAGES_PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("pageToken".into(), "p2".into()),
                Matcher::UrlEncoded("maxResults".into(), "1".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"messages":[{"id":"m2","threadId":"t"}],"nextPageToken":"p3"}"#)
            .create_async()
            .await;
        for id in ["m1", "m2"] {
            h.server
                .mock("GET", format!("{MESSAGES_PATH}/{id}").as_str())
                .match_query(Matcher::Any)
                .with_header("content-type", "application/json")
                .with_body(full_message(id, id))
                .create_async()
                .await;
        }

        let messages = h
            .client
            .search("from:boss@example.com is:unread", 2)
            .await
            .unwrap();

        first.assert_async().await;
        second.assert_async().await;
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn test_detail_fetch_error_propagates() {
        let mut h = harness(true).await;
        h.server
            .mock("GET", MESSAGES_PATH)
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"{"messages":[{"id":"gone","threadId":"t"}]}"#)
            .create_async()
            .await;
        h.server
            .mock("GET", format!("{MESSAGES_PATH}/gone").as_str())
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let err = h.client.search("anything", 10).await.unwrap_err();
        assert!(matches!(
            err,
            GmailMcpError::Gmail(GmailApiError::MessageNotFound { ref message_id }) if message_id == "gone"
        ));
    }

    #[tokio::test]
    async fn test_list_error_propagates() {
        let mut h = harness(true).await;
        h.server
            .mock("GET", MESSAGES_PATH)
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("backend error")
            .create_async()
            .await;

        let err = h.client.list_unread(5).await.unwrap_err();
        assert!(err.to_string().contains("backend error"));
    }

    #[tokio::test]
    async fn test_archive_partial_failure_continues() {
        let mut h = harness(true).await;
        let body = Matcher::Json(json!({"removeLabelIds": ["INBOX", "UNREAD"]}));
        let a = h
            .server
            .mock("POST", format!("{MESSAGES_PATH}/a/modify").as_str())
            .match_body(body.clone())
            .with_body(r#"{"id":"a"}"#)
            .create_async()
            .await;
        let b = h
            .server
            .mock("POST", format!("{MESSAGES_PATH}/b/modify").as_str())
            .with_status(404)
            .create_async()
            .await;
        let c = h
            .server
            .mock("POST", format!("{MESSAGES_PATH}/c/modify").as_str())
            .match_body(body)
            .with_body(r#"{"id":"c"}"#)
            .create_async()
            .await;

        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let summary = h.client.archive_messages(&ids).await.unwrap();

        a.assert_async().await;
        b.assert_async().await;
        c.assert_async().await;
        assert_eq!(summary.archived_count, 2);
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.details.archived, vec!["a", "c"]);
        assert_eq!(summary.details.failed.len(), 1);
        assert_eq!(summary.details.failed[0].id, "b");
        assert!(summary.details.failed[0].error.contains("b"));
    }

    #[tokio::test]
    async fn test_archive_twice_is_stable() {
        let mut h = harness(true).await;
        let modify = h
            .server
            .mock("POST", Matcher::Regex(r"^/gmail/v1/users/me/messages/[^/]+/modify$".into()))
            .with_body("{}")
            .expect(4)
            .create_async()
            .await;

        let ids = vec!["x".to_string(), "y".to_string()];
        let first = h.client.archive_messages(&ids).await.unwrap();
        let second = h.client.archive_messages(&ids).await.unwrap();

        modify.assert_async().await;
        assert_eq!(first.archived_count, 2);
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_mark_as_read_only_removes_unread() {
        let mut h = harness(true).await;
        let modify = h
            .server
            .mock("POST", format!("{MESSAGES_PATH}/m1/modify").as_str())
            .match_body(Matcher::Json(json!({"removeLabelIds": ["UNREAD"]})))
            .with_body("{}")
            .create_async()
            .await;

        let summary = h.client.mark_as_read(&["m1".to_string()]).await.unwrap();

        modify.assert_async().await;
        assert_eq!(summary.marked_count, 1);
        assert_eq!(summary.failed_count, 0);
        assert_eq!(summary.details.marked, vec!["m1"]);
    }

    #[tokio::test]
    async fn test_list_labels_maps_fields() {
        let mut h = harness(true).await;
        h.server
            .mock("GET", "/gmail/v1/users/me/labels")
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"labels":[
                    {"id":"INBOX","name":"INBOX","type":"system","messagesTotal":12,"messagesUnread":3,"threadsTotal":10,"threadsUnread":2},
                    {"id":"Label_1","name":"Receipts"}
                ]}"#,
            )
            .create_async()
            .await;

        let labels = h.client.list_labels().await.unwrap();

        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].label_type, "system");
        assert_eq!(labels[0].messages_unread, Some(3));
        assert_eq!(labels[0].threads_total, Some(10));
        assert_eq!(labels[1].label_type, "user");
        assert_eq!(labels[1].messages_total, None);
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_any_request() {
        let mut h = harness(false).await;
        let never = h
            .server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = h.client.list_unread(10).await.unwrap_err();
        assert!(err.is_auth_required());

        let err = h.client.archive_messages(&["a".to_string()]).await.unwrap_err();
        assert!(err.is_auth_required());

        never.assert_async().await;
    }
}
