//! DingTalk Notify - Main Entry Point
//!
//! Serves DingTalk web login, robot messages and SMTP mail over HTTP.
//! One token cache is shared by every open API call of the process.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dingtalk_notify::server::{self, AppState};
use dingtalk_notify::{Credential, DingTalkClient, DingTalkRobot, Mailer, NotifyConfig, TokenCache};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,dingtalk_notify=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 DingTalk Notify starting...");

    let config = NotifyConfig::from_env()?;
    info!("📋 Configuration loaded");

    let tokens = Arc::new(TokenCache::with_policy(
        Duration::from_secs(config.token_ttl_secs),
        Duration::from_secs(config.token_cleanup_secs),
    ));

    let client = DingTalkClient::new(
        Credential::new(config.app_key.clone(), config.app_secret.clone()),
        tokens,
    )
    .with_app(config.agent_id.clone(), config.corp_id.clone());

    let robot = match config.robot_token.as_deref() {
        Some(token) if config.robot_enabled() => Some(DingTalkRobot::new(token)),
        _ => {
            info!("🤖 Robot webhook disabled");
            None
        }
    };

    let mailer = match (&config.smtp_host, &config.smtp_account, &config.smtp_password) {
        (Some(host), Some(account), Some(password)) => {
            info!("📧 SMTP enabled via {}:{}", host, config.smtp_port);
            Some(Mailer::new(host, config.smtp_port, account, password))
        }
        _ => {
            info!("📧 SMTP disabled");
            None
        }
    };

    let addr: SocketAddr = config
        .http_addr
        .parse()
        .with_context(|| format!("Invalid HTTP_ADDR: {}", config.http_addr))?;

    let state = AppState {
        config,
        client,
        robot,
        mailer,
    };

    let http_server = tokio::spawn(async move {
        if let Err(e) = server::run_server(addr, state).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });
    info!("🌐 HTTP server listening on {}", addr);

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => info!("📢 Shutdown signal received"),
        Err(err) => tracing::error!("Unable to listen for shutdown signal: {}", err),
    }

    http_server.abort();
    info!("✅ DingTalk Notify stopped");
    Ok(())
}
