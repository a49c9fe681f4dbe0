//! HTTP front for DingTalk login, robot messages and mail

use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::net::SocketAddr;
use tracing::{error, info, warn};

use crate::config::NotifyConfig;
use crate::dingtalk_api::DingTalkClient;
use crate::error::MessageError;
use crate::mail::{MailMessage, Mailer, split_recipients};
use crate::robot::DingTalkRobot;
use crate::types::{ChatMessage, UserDetail};
use crate::urls;

/// Server state
#[derive(Clone)]
pub struct AppState {
    pub config: NotifyConfig,
    pub client: DingTalkClient,
    pub robot: Option<DingTalkRobot>,
    pub mailer: Option<Mailer>,
}

/// Failed upstream call, reported as 502 with the error message
struct UpstreamError(MessageError);

impl From<MessageError> for UpstreamError {
    fn from(err: MessageError) -> Self {
        Self(err)
    }
}

impl IntoResponse for UpstreamError {
    fn into_response(self) -> Response {
        error!("Upstream call failed: {}", self.0);
        (StatusCode::BAD_GATEWAY, self.0.to_string()).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    #[serde(default)]
    pub state: String,
}

/// Deep link request; `slide` opens the desktop side panel instead of the workbench
#[derive(Debug, Deserialize)]
pub struct LinkParams {
    pub target: String,
    #[serde(default)]
    pub slide: bool,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: String,
}

/// Mail request; `to` and `cc` are comma-separated lists
#[derive(Debug, Deserialize)]
pub struct MailRequest {
    pub subject: String,
    pub from_alias: String,
    pub to: String,
    #[serde(default)]
    pub cc: Option<String>,
    pub body: String,
}

impl MailRequest {
    fn into_message(self) -> MailMessage {
        MailMessage {
            subject: self.subject,
            from_alias: self.from_alias,
            to: split_recipients(&self.to),
            cc: self.cc.as_deref().map(split_recipients).unwrap_or_default(),
            body: self.body,
            attachments: Vec::new(),
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/dingtalk/login", get(login))
        .route("/dingtalk/callback", get(callback))
        .route("/dingtalk/link", get(open_link))
        .route("/robot/send", post(send_robot_message))
        .route("/mail/send", post(send_mail))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Middleware to log all incoming HTTP requests
async fn log_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    // Query strings carry temp codes, keep them out of the log
    info!("🌐 HTTP {} {} -> {}", method, path, response.status());
    response
}

/// Redirect the browser to the DingTalk login page
async fn login(
    State(state): State<AppState>,
    Query(params): Query<LoginParams>,
) -> Result<Redirect, StatusCode> {
    let Some(callback) = state.config.login_callback_url.as_deref() else {
        warn!("Login requested but DINGTALK_LOGIN_CALLBACK is not set");
        return Err(StatusCode::BAD_REQUEST);
    };

    let url = urls::login_url(state.client.app_key(), &params.state, callback);
    Ok(Redirect::to(&url))
}

/// Exchange the temp code delivered to the login callback for a user profile
async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<UserDetail>, UpstreamError> {
    let detail = state.client.resolve_user_detail(&params.code).await?;
    Ok(Json(detail))
}

/// Build a `dingtalk://` link opening `target` inside the client
async fn open_link(
    State(state): State<AppState>,
    Query(params): Query<LinkParams>,
) -> Result<String, StatusCode> {
    if params.slide {
        return Ok(urls::open_link_by_slide(&params.target));
    }

    match (state.client.corp_id(), state.client.agent_id()) {
        (Some(corp_id), Some(agent_id)) => Ok(urls::open_link_by_work_platform(
            corp_id,
            agent_id,
            &params.target,
        )),
        _ => {
            warn!("Workbench link requested without DINGTALK_CORP_ID and DINGTALK_AGENT_ID");
            Err(StatusCode::BAD_REQUEST)
        }
    }
}

async fn send_robot_message(
    State(state): State<AppState>,
    Json(message): Json<ChatMessage>,
) -> Result<StatusCode, Response> {
    let robot = state
        .robot
        .as_ref()
        .ok_or_else(|| (StatusCode::SERVICE_UNAVAILABLE, "robot not configured").into_response())?;

    robot
        .send(&message)
        .await
        .map_err(|e| UpstreamError(e).into_response())?;
    Ok(StatusCode::NO_CONTENT)
}

async fn send_mail(
    State(state): State<AppState>,
    Json(request): Json<MailRequest>,
) -> Result<StatusCode, Response> {
    let mailer = state
        .mailer
        .as_ref()
        .ok_or_else(|| (StatusCode::SERVICE_UNAVAILABLE, "mail not configured").into_response())?;

    mailer
        .send(&request.into_message())
        .await
        .map_err(|e| match e {
            MessageError::InvalidAddress(_) => {
                warn!("Rejected mail request: {}", e);
                (StatusCode::BAD_REQUEST, e.to_string()).into_response()
            }
            e => UpstreamError(e).into_response(),
        })?;
    Ok(StatusCode::NO_CONTENT)
}
