//! DingTalk open API client
//!
//! Handles:
//! - Access token exchange (app key + app secret), cached in a shared [`TokenCache`]
//! - Temp code → basic user info
//! - Temp code → user info → full user detail

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::{MessageError, Result};
use crate::token_cache::TokenCache;
use crate::types::{AccessToken, ApiResponse, ResultPayload, UserDetail, UserInfo};
use crate::urls::OPEN_API_BASE;

/// Per-request timeout of every open API call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

const USER_DETAIL_LANGUAGE: &str = "zh_CN";

/// Application credential registered on the open platform
#[derive(Debug, Clone)]
pub struct Credential {
    pub app_key: String,
    pub app_secret: String,
}

impl Credential {
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
        }
    }

    fn is_usable(&self) -> bool {
        !self.app_key.is_empty() && !self.app_secret.is_empty()
    }
}

/// Decode an open API response: check the errcode once, then the payload.
///
/// `reject` turns the platform's errmsg into the error for this endpoint.
fn decode_envelope<T: DeserializeOwned>(
    body: &[u8],
    reject: fn(String) -> MessageError,
) -> Result<T> {
    let head: ApiResponse = serde_json::from_slice(body)?;
    if head.errcode != 0 {
        warn!("DingTalk API error: {} - {}", head.errcode, head.errmsg);
        return Err(reject(head.errmsg));
    }
    Ok(serde_json::from_slice(body)?)
}

/// DingTalk open API client
#[derive(Clone)]
pub struct DingTalkClient {
    credential: Credential,
    agent_id: Option<String>,
    corp_id: Option<String>,
    base_url: String,
    http: Client,
    tokens: Arc<TokenCache>,
}

impl DingTalkClient {
    /// Create a client sharing `tokens` with every other client of the process
    pub fn new(credential: Credential, tokens: Arc<TokenCache>) -> Self {
        Self {
            credential,
            agent_id: None,
            corp_id: None,
            base_url: OPEN_API_BASE.to_string(),
            http: Client::new(),
            tokens,
        }
    }

    /// Attach the app's agent id and corp id (used for deep links)
    pub fn with_app(mut self, agent_id: Option<String>, corp_id: Option<String>) -> Self {
        self.agent_id = agent_id;
        self.corp_id = corp_id;
        self
    }

    /// Override the open API base URL (for testing with wiremock)
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn app_key(&self) -> &str {
        &self.credential.app_key
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    pub fn corp_id(&self) -> Option<&str> {
        self.corp_id.as_deref()
    }

    /// Exchange the credential for a fresh access token and cache it
    pub async fn fetch_access_token(&self) -> Result<AccessToken> {
        if !self.credential.is_usable() {
            error!("Refusing to fetch access token with empty AppKey or AppSecret");
            return Err(MessageError::InvalidCredential);
        }

        debug!("Fetching DingTalk access token for {}", self.credential.app_key);

        let body = self
            .http
            .get(format!("{}/gettoken", self.base_url))
            .query(&[
                ("appkey", self.credential.app_key.as_str()),
                ("appsecret", self.credential.app_secret.as_str()),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .bytes()
            .await?;

        let token: AccessToken = decode_envelope(&body, MessageError::Auth)?;
        self.tokens.put(&self.credential.app_key, token.access_token.clone());

        info!(
            "DingTalk access token cached for {}, platform expiry {}s",
            self.credential.app_key, token.expires_in
        );
        Ok(token)
    }

    /// Get a valid access token, refreshing on a cache miss
    pub async fn get_cached_token(&self) -> Result<String> {
        if let Some(token) = self.tokens.get(&self.credential.app_key) {
            debug!("Using cached DingTalk access token");
            return Ok(token);
        }

        let token = self.fetch_access_token().await?;
        if token.access_token.is_empty() {
            return Err(MessageError::Auth(
                "DingTalk returned an empty access token".to_string(),
            ));
        }
        Ok(token.access_token)
    }

    /// POST `body` to an authenticated topapi endpoint and decode its `result`
    async fn post_topapi<B, T>(&self, path: &str, token: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .query(&[("access_token", token)])
            .json(body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .bytes()
            .await?;

        let payload: ResultPayload<T> = decode_envelope(&response, MessageError::Api)?;
        Ok(payload.result)
    }

    async fn user_info_with_token(&self, token: &str, temp_code: &str) -> Result<UserInfo> {
        debug!("Resolving DingTalk user info from temp code");
        let body = serde_json::json!({ "code": temp_code });
        self.post_topapi("/topapi/v2/user/getuserinfo", token, &body)
            .await
    }

    /// Resolve the basic identity behind a one-time temp code
    pub async fn resolve_user_info(&self, temp_code: &str) -> Result<UserInfo> {
        let token = self.get_cached_token().await?;
        self.user_info_with_token(&token, temp_code).await
    }

    /// Resolve the full profile behind a one-time temp code
    pub async fn resolve_user_detail(&self, temp_code: &str) -> Result<UserDetail> {
        let token = self.get_cached_token().await?;
        let info = self.user_info_with_token(&token, temp_code).await?;

        let body = serde_json::json!({
            "userid": info.userid,
            "language": USER_DETAIL_LANGUAGE,
        });
        let detail: UserDetail = self
            .post_topapi("/topapi/v2/user/get", &token, &body)
            .await?;

        info!("Resolved DingTalk user {}", detail.userid);
        Ok(detail)
    }
}
