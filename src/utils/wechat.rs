use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{error, info};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;
use crate::checker::Notifier;
use crate::config::WechatConfig;
use crate::models::GradeSnapshot;

/// Text of the template card. The changed courses are not listed, only the fact that
/// something changed.
pub const MESSAGE_TITLE: &str = "您有新的成绩更新：\n";

/// Status line and body of a platform reply, before any interpretation.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TemplateMessage {
    pub touser: String,
    pub template_id: String,
    pub url: String,
    pub data: TemplateData,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TemplateData {
    pub content: TemplateContent,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TemplateContent {
    pub title: String,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("{0} is not set")]
    MissingConfig(&'static str),
    #[error("request to the WeChat API failed: {0:#}")]
    Transport(anyhow::Error),
    #[error("token request answered HTTP {0}, send skipped")]
    HttpStatus(u16),
    #[error("WeChat server sent a non-JSON reply: {0}")]
    Malformed(String),
    #[error("no access_token in reply {0}, send skipped")]
    NoToken(String),
    #[error("send rejected: {0}")]
    Rejected(String),
}

/// The two REST calls the notifier makes.
#[async_trait]
pub trait WechatTransport: Send + Sync {
    async fn fetch_token(&self, app_id: &str, app_secret: &str) -> Result<ApiResponse>;
    async fn send_template(&self, access_token: &str, message: &TemplateMessage) -> Result<ApiResponse>;
}

pub struct ReqwestTransport {
    client: Client,
    api_base: String,
}

impl ReqwestTransport {
    pub fn new(api_base: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build the client")?;
        Ok(Self { client, api_base: api_base.into() })
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        Url::parse_with_params(&format!("{}{}", self.api_base, path), query)
            .with_context(|| format!("Invalid WeChat API base {:?}", self.api_base))
    }
}

#[async_trait]
impl WechatTransport for ReqwestTransport {
    async fn fetch_token(&self, app_id: &str, app_secret: &str) -> Result<ApiResponse> {
        let url = self.endpoint(
            "/cgi-bin/token",
            &[("grant_type", "client_credential"), ("appid", app_id), ("secret", app_secret)],
        )?;
        let response = self.client.get(url)
            .send()
            .await
            .context("Failed to send token request")?;
        let status = response.status().as_u16();
        let body = response.text().await.context("Failed to read response text")?;
        Ok(ApiResponse { status, body })
    }

    async fn send_template(&self, access_token: &str, message: &TemplateMessage) -> Result<ApiResponse> {
        let url = self.endpoint("/cgi-bin/message/template/send", &[("access_token", access_token)])?;
        let response = self.client.post(url)
            .json(message)
            .send()
            .await
            .context("Failed to send template message")?;
        let status = response.status().as_u16();
        let body = response.text().await.context("Failed to read response text")?;
        Ok(ApiResponse { status, body })
    }
}

/// Pulls the access token out of a token endpoint reply.
pub fn parse_token_response(response: &ApiResponse) -> Result<String, NotifyError> {
    if response.status != 200 {
        return Err(NotifyError::HttpStatus(response.status));
    }
    let json: Value = serde_json::from_str(&response.body)
        .map_err(|_| NotifyError::Malformed(response.body.clone()))?;
    match json.get("access_token").and_then(Value::as_str) {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => Err(NotifyError::NoToken(response.body.clone())),
    }
}

/// Only `errcode == 0` counts as delivered; the HTTP status is not consulted.
pub fn parse_send_response(response: &ApiResponse) -> Result<(), NotifyError> {
    let json: Value = serde_json::from_str(&response.body)
        .map_err(|_| NotifyError::Malformed(response.body.clone()))?;
    match json.get("errcode").and_then(Value::as_i64) {
        Some(0) => Ok(()),
        _ => Err(NotifyError::Rejected(response.body.clone())),
    }
}

/// Sends the "grades changed" template message to one official account follower.
pub struct WechatNotifier<T: WechatTransport> {
    config: WechatConfig,
    transport: T,
}

impl WechatNotifier<ReqwestTransport> {
    pub fn from_config(config: WechatConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.api_base.clone())?;
        Ok(Self::new(config, transport))
    }
}

impl<T: WechatTransport> WechatNotifier<T> {
    pub fn new(config: WechatConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn access_token(&self) -> Result<String, NotifyError> {
        let app_id = self.config.app_id.as_deref().ok_or(NotifyError::MissingConfig("WX_APPID"))?;
        let app_secret = self.config.app_secret.as_deref().ok_or(NotifyError::MissingConfig("WX_SECRET"))?;
        let response = self.transport
            .fetch_token(app_id, app_secret)
            .await
            .map_err(NotifyError::Transport)?;
        parse_token_response(&response)
    }

    pub fn message(&self) -> Result<TemplateMessage, NotifyError> {
        let open_id = self.config.open_id.as_deref().ok_or(NotifyError::MissingConfig("WX_OPENID"))?;
        let template_id = self.config.template_id.as_deref().ok_or(NotifyError::MissingConfig("WX_TEMPLATE_ID"))?;
        Ok(TemplateMessage {
            touser: open_id.to_string(),
            template_id: template_id.to_string(),
            url: self.config.template_url.clone(),
            data: TemplateData {
                content: TemplateContent { title: MESSAGE_TITLE.to_string() },
            },
        })
    }

    async fn deliver(&self) -> Result<(), NotifyError> {
        let message = self.message()?;
        let access_token = self.access_token().await?;
        let response = self.transport
            .send_template(&access_token, &message)
            .await
            .map_err(NotifyError::Transport)?;
        parse_send_response(&response)
    }
}

#[async_trait]
impl<T: WechatTransport> Notifier for WechatNotifier<T> {
    async fn notify(&self, grades: &GradeSnapshot) -> bool {
        if grades.is_empty() {
            return false;
        }
        match self.deliver().await {
            Ok(()) => {
                info!("WeChat notification sent");
                true
            }
            Err(e) => {
                error!("WeChat notification failed: {}", e);
                false
            }
        }
    }
}
