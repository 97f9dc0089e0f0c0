use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    describe_provider_error, Channel, Destination, MessageSender, NotificationError, SendReceipt,
    WHATSAPP_PREFIX,
};
use crate::config::AppConfig;

#[derive(Clone, Debug)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub sms_from: Option<String>,
    pub whatsapp_from: Option<String>,
    pub api_base: String,
    pub timeout: Duration,
}

impl TwilioConfig {
    /// `None` unless credentials and at least one sender are configured.
    pub fn from_app_config(cfg: &AppConfig) -> Option<Self> {
        if !cfg.messaging_enabled() {
            return None;
        }
        Some(Self {
            account_sid: cfg.twilio_account_sid.clone()?,
            auth_token: cfg.twilio_auth_token.clone()?,
            sms_from: cfg.twilio_sms_from.clone().filter(|s| !s.trim().is_empty()),
            whatsapp_from: cfg
                .twilio_whatsapp_from
                .clone()
                .filter(|s| !s.trim().is_empty()),
            api_base: cfg.twilio_api_base.trim_end_matches('/').to_string(),
            timeout: cfg.gateway_timeout(),
        })
    }
}

/// Twilio Messages API sender.
#[derive(Clone)]
pub struct TwilioSender {
    config: TwilioConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct MessageResource {
    sid: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct TwilioErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

impl TwilioSender {
    pub fn new(config: TwilioConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    fn from_address(&self, channel: Channel) -> Result<String, NotificationError> {
        let from = match channel {
            Channel::Sms => self.config.sms_from.as_deref(),
            Channel::Whatsapp => self.config.whatsapp_from.as_deref(),
        }
        .ok_or(NotificationError::NotConfigured(channel))?;

        Ok(match channel {
            Channel::Whatsapp if !from.starts_with(WHATSAPP_PREFIX) => {
                format!("{}{}", WHATSAPP_PREFIX, from)
            }
            _ => from.to_string(),
        })
    }
}

#[async_trait]
impl MessageSender for TwilioSender {
    async fn deliver(
        &self,
        destination: &Destination,
        body: &str,
    ) -> Result<SendReceipt, NotificationError> {
        let from = self.from_address(destination.channel)?;
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base, self.config.account_sid
        );
        let to = destination.provider_address();
        let params = [("To", to.as_str()), ("From", from.as_str()), ("Body", body)];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotificationError::Timeout
                } else {
                    NotificationError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let parsed = serde_json::from_str::<TwilioErrorBody>(&error_text).ok();
            let code = parsed.as_ref().and_then(|b| b.code);
            warn!(
                status = status.as_u16(),
                code = ?code,
                provider_message = ?parsed.as_ref().and_then(|b| b.message.as_deref()),
                "Twilio rejected message"
            );
            return Err(NotificationError::Provider {
                code,
                reason: code
                    .map(describe_provider_error)
                    .unwrap_or("provider error")
                    .to_string(),
            });
        }

        let message: MessageResource = response.json().await.map_err(|e| {
            NotificationError::Provider {
                code: None,
                reason: format!("malformed provider response: {}", e),
            }
        })?;

        Ok(SendReceipt {
            sid: message.sid,
            status: message.status.unwrap_or_else(|| "queued".to_string()),
        })
    }
}

/// Stand-in used when messaging credentials are absent; logs and succeeds.
#[derive(Clone, Default)]
pub struct LoggingSender;

#[async_trait]
impl MessageSender for LoggingSender {
    async fn deliver(
        &self,
        destination: &Destination,
        body: &str,
    ) -> Result<SendReceipt, NotificationError> {
        info!(
            channel = %destination.channel,
            to = %destination.provider_address(),
            chars = body.chars().count(),
            "messaging disabled, message logged only"
        );
        Ok(SendReceipt {
            sid: format!("LOCAL{}", Uuid::new_v4().simple()),
            status: "logged".to_string(),
        })
    }
}
