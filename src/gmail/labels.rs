//! Label listing for Gmail

use crate::error::{GmailApiError, GmailMcpError, Result};
use crate::gmail::types::{LabelList, LabelSummary};

/// Label manager for Gmail operations
pub struct LabelManager<'a> {
    client: &'a reqwest::Client,
    api_base: &'a str,
    access_token: &'a str,
}

impl<'a> LabelManager<'a> {
    /// Create a new label manager
    pub fn new(client: &'a reqwest::Client, api_base: &'a str, access_token: &'a str) -> Self {
        Self {
            client,
            api_base,
            access_token,
        }
    }

    /// Base URL for labels API
    fn base_url(&self) -> String {
        format!(
            "{}/users/{}/labels",
            self.api_base,
            crate::config::gmail::USER_ID
        )
    }

    /// List all labels, with counts where Gmail reports them
    pub async fn list(&self) -> Result<Vec<LabelSummary>> {
        let response = self
            .client
            .get(self.base_url())
            .bearer_auth(self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            tracing::error!("Gmail API error getting labels: {} {}", status, text);
            return Err(GmailMcpError::Gmail(GmailApiError::RequestFailed {
                operation: "list labels".to_string(),
                message: format!("({}): {}", status, text),
            }));
        }

        let list: LabelList = response.json().await?;
        Ok(list.labels.into_iter().map(LabelSummary::from).collect())
    }
}
