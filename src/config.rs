//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::mail::IMPLICIT_TLS_PORT;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    // =========================================================================
    // DingTalk Open API
    // =========================================================================
    /// AppKey of the internal app
    pub app_key: String,

    /// AppSecret of the internal app
    pub app_secret: String,

    /// AgentID of the app (deep links into the workbench)
    pub agent_id: Option<String>,

    /// CorpID of the organization
    pub corp_id: Option<String>,

    /// Callback receiving the temp code after web login
    pub login_callback_url: Option<String>,

    // =========================================================================
    // Robot Webhook
    // =========================================================================
    /// access_token of the group robot webhook (robot disabled when unset)
    pub robot_token: Option<String>,

    // =========================================================================
    // SMTP
    // =========================================================================
    /// SMTP host (mail disabled when unset)
    pub smtp_host: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Sending account, also used as the From address
    pub smtp_account: Option<String>,

    pub smtp_password: Option<String>,

    // =========================================================================
    // Common Configuration
    // =========================================================================
    /// HTTP server bind address
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Lifetime of a cached access token in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,

    /// Interval between sweeps of expired tokens in seconds
    #[serde(default = "default_token_cleanup")]
    pub token_cleanup_secs: u64,
}

fn default_smtp_port() -> u16 {
    IMPLICIT_TLS_PORT
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_token_ttl() -> u64 {
    7000 // platform tokens live 7200s
}

fn default_token_cleanup() -> u64 {
    7200
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

impl NotifyConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let app_key = std::env::var("DINGTALK_APP_KEY").context("DINGTALK_APP_KEY is required")?;
        let app_secret =
            std::env::var("DINGTALK_APP_SECRET").context("DINGTALK_APP_SECRET is required")?;

        Ok(Self {
            app_key,
            app_secret,
            agent_id: std::env::var("DINGTALK_AGENT_ID").ok(),
            corp_id: std::env::var("DINGTALK_CORP_ID").ok(),
            login_callback_url: std::env::var("DINGTALK_LOGIN_CALLBACK").ok(),

            robot_token: std::env::var("DINGTALK_ROBOT_TOKEN").ok(),

            smtp_host: std::env::var("SMTP_HOST").ok(),
            smtp_port: parse_var("SMTP_PORT").unwrap_or_else(default_smtp_port),
            smtp_account: std::env::var("SMTP_ACCOUNT").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),

            http_addr: std::env::var("HTTP_ADDR").unwrap_or_else(|_| default_http_addr()),
            token_ttl_secs: parse_var("TOKEN_CACHE_TTL_SECS").unwrap_or_else(default_token_ttl),
            token_cleanup_secs: parse_var("TOKEN_CACHE_CLEANUP_SECS")
                .unwrap_or_else(default_token_cleanup),
        })
    }

    /// Check if the group robot is configured
    pub fn robot_enabled(&self) -> bool {
        self.robot_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Check if SMTP is fully configured
    pub fn mail_enabled(&self) -> bool {
        self.smtp_host.is_some() && self.smtp_account.is_some() && self.smtp_password.is_some()
    }
}
