//! Message and payload types for the DingTalk open API and robot webhook

use serde::{Deserialize, Serialize};

// =============================================================================
// Robot (chat bot) Messages
// =============================================================================

/// Message body, tagged by `msgtype` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "msgtype", rename_all = "lowercase")]
pub enum MessageBody {
    /// Markdown message; DingTalk renders a subset of markdown
    /// (headings, quotes, bold/italic, links, images, lists)
    Markdown { markdown: MarkdownContent },
}

/// Markdown payload of a robot message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownContent {
    /// Title shown in the conversation list
    pub title: String,
    pub text: String,
}

/// Mention directive of a robot message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct At {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub at_mobiles: Vec<String>,
    #[serde(default)]
    pub is_at_all: bool,
}

/// Message posted to a robot webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(flatten)]
    pub body: MessageBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<At>,
}

impl ChatMessage {
    /// Create a markdown message without mentions
    pub fn markdown(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            body: MessageBody::Markdown {
                markdown: MarkdownContent {
                    title: title.into(),
                    text: text.into(),
                },
            },
            at: None,
        }
    }

    /// Mention the members owning these mobile numbers
    pub fn at_mobiles<I, S>(mut self, mobiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let at = self.at.get_or_insert_with(At::default);
        at.at_mobiles.extend(mobiles.into_iter().map(Into::into));
        self
    }

    /// Mention everyone in the group
    pub fn at_all(mut self) -> Self {
        self.at.get_or_insert_with(At::default).is_at_all = true;
        self
    }
}

// =============================================================================
// Open API Payloads
// =============================================================================

/// Common head of every open API response (errcode 0 means success)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
}

/// Access token issued for an app key/secret pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    /// Lifetime declared by the platform, in seconds
    #[serde(default)]
    pub expires_in: i64,
}

/// Basic identity resolved from a one-time temp code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    pub userid: String,
    pub unionid: String,
    pub associated_unionid: String,
    pub device_id: String,
    pub sys_level: i32,
    pub name: String,
    pub sys: bool,
}

/// Full user profile resolved from a userid
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserDetail {
    pub userid: String,
    pub unionid: String,
    pub email: String,
    pub mobile: String,
    pub name: String,
    pub active: bool,
    pub remark: String,
}

/// `{"result": ...}` wrapper used by the topapi endpoints
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResultPayload<T> {
    pub result: T,
}

// =============================================================================
// Tests
// =============================================================================
