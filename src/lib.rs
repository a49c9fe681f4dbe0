//! DingTalk Notify Library
//!
//! Notification and identity helpers for the DingTalk enterprise platform.
//!
//! # Components
//!
//! ```text
//! TokenCache ◀── DingTalkClient ──HTTPS──▶ oapi.dingtalk.com  (token, user info, user detail)
//!                DingTalkRobot  ──HTTPS──▶ /robot/send        (group webhook)
//!                Mailer         ──SMTP───▶ mail relay
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use dingtalk_notify::prelude::*;
//!
//! # async fn run() -> dingtalk_notify::Result<()> {
//! let tokens = Arc::new(TokenCache::new());
//! let client = DingTalkClient::new(Credential::new("ding_app", "secret"), tokens);
//! let user = client.resolve_user_detail("temp-code").await?;
//!
//! let robot = DingTalkRobot::new("robot-token");
//! robot
//!     .send(&ChatMessage::markdown("Login", format!("{} signed in", user.name)).at_all())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dingtalk_api;
pub mod error;
pub mod mail;
pub mod robot;
pub mod server;
pub mod token_cache;
pub mod types;
pub mod urls;

pub use config::NotifyConfig;
pub use dingtalk_api::{Credential, DingTalkClient};
pub use error::{MessageError, Result};
pub use mail::{MailMessage, Mailer};
pub use robot::DingTalkRobot;
pub use token_cache::TokenCache;
pub use types::*;

/// Prelude for common imports
pub mod prelude {
    pub use crate::dingtalk_api::{Credential, DingTalkClient};
    pub use crate::error::{MessageError, Result};
    pub use crate::mail::{MailMessage, Mailer};
    pub use crate::robot::DingTalkRobot;
    pub use crate::token_cache::TokenCache;
    pub use crate::types::*;
}
