//! DingTalk robot (group chat bot) webhook

use reqwest::Client;
use tracing::{debug, info};

use crate::error::Result;
use crate::types::ChatMessage;
use crate::urls::OPEN_API_BASE;

/// Robot bound to a group chat, addressed by its webhook access token
#[derive(Clone)]
pub struct DingTalkRobot {
    access_token: String,
    base_url: String,
    http: Client,
}

impl DingTalkRobot {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            base_url: OPEN_API_BASE.to_string(),
            http: Client::new(),
        }
    }

    /// Override the webhook base URL (for testing with wiremock)
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Post a message to the group
    ///
    /// Only transport failures are reported. The response body is not checked
    /// for an errcode, so a rejected message still returns `Ok`.
    pub async fn send(&self, message: &ChatMessage) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/robot/send", self.base_url))
            .query(&[("access_token", self.access_token.as_str())])
            .json(message)
            .send()
            .await?;

        let status = response.status();
        // Logged for troubleshooting only
        let body = response.text().await.unwrap_or_default();
        debug!("Robot webhook answered {}: {}", status, body);

        info!("Robot message posted");
        Ok(())
    }
}
