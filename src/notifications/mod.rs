//! Outbound SMS and WhatsApp messaging.
//!
//! [`NotificationGateway`] normalizes the destination number and hands the
//! message to a [`MessageSender`]. Delivery is best-effort: callers on the
//! checkout path enqueue through [`dispatcher::NotificationDispatcher`] and
//! never wait on the result.

pub mod dispatcher;
pub mod templates;
pub mod twilio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};
use thiserror::Error;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

pub use dispatcher::{NotificationDispatcher, NotificationJob, NotificationOutcome};
pub use templates::MessageTemplate;
pub use twilio::{LoggingSender, TwilioSender};

const WHATSAPP_PREFIX: &str = "whatsapp:";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sms,
    Whatsapp,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Sms => f.write_str("sms"),
            Channel::Whatsapp => f.write_str("whatsapp"),
        }
    }
}

impl FromStr for Channel {
    type Err = NotificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sms" => Ok(Channel::Sms),
            "whatsapp" => Ok(Channel::Whatsapp),
            other => Err(NotificationError::UnsupportedChannel(other.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("invalid phone number: {0}")]
    InvalidPhone(String),
    #[error("message body is empty")]
    EmptyMessage,
    #[error("unsupported channel: {0}")]
    UnsupportedChannel(String),
    #[error("{0} messaging is not configured")]
    NotConfigured(Channel),
    #[error("{reason}")]
    Provider { code: Option<i64>, reason: String },
    #[error("messaging provider timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("notification queue is full")]
    QueueFull,
    #[error("notification queue is closed")]
    QueueClosed,
}

impl NotificationError {
    pub fn provider_code(&self) -> Option<i64> {
        match self {
            NotificationError::Provider { code, .. } => *code,
            _ => None,
        }
    }
}

/// Human-readable reason for a provider error code.
pub fn describe_provider_error(code: i64) -> &'static str {
    match code {
        21211 | 21614 => "The phone number is invalid or cannot receive messages",
        21608 | 63015 => "The WhatsApp recipient has not opted in to receive messages",
        20429 => "Too many messages sent; please try again later",
        20003 => "Messaging provider authentication failed",
        63016 => "The WhatsApp 24-hour messaging window has closed",
        _ => "provider error",
    }
}

/// A normalized destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Destination {
    pub channel: Channel,
    /// E.164, e.g. `+919876543210`
    pub e164: String,
}

impl Destination {
    /// Address in the form the provider expects for this channel.
    pub fn provider_address(&self) -> String {
        match self.channel {
            Channel::Sms => self.e164.clone(),
            Channel::Whatsapp => format!("{}{}", WHATSAPP_PREFIX, self.e164),
        }
    }
}

/// Normalizes a user-entered number to E.164.
///
/// Ten local digits get `default_country_code`; a leading trunk `0` is
/// dropped; a number already carrying the country code without `+` gains it.
pub fn normalize_phone(raw: &str, default_country_code: &str) -> Result<String, NotificationError> {
    let raw = raw.trim();
    let raw = raw.strip_prefix(WHATSAPP_PREFIX).unwrap_or(raw).trim();
    let has_plus = raw.starts_with('+');
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let cc: String = default_country_code
        .chars()
        .filter(char::is_ascii_digit)
        .collect();

    let normalized = if has_plus {
        digits
    } else if digits.len() == 10 {
        format!("{}{}", cc, digits)
    } else if digits.len() == 11 && digits.starts_with('0') {
        format!("{}{}", cc, &digits[1..])
    } else if !cc.is_empty() && digits.len() == cc.len() + 10 && digits.starts_with(&cc) {
        digits
    } else {
        return Err(NotificationError::InvalidPhone(raw.to_string()));
    };

    if !(8..=15).contains(&normalized.len()) {
        return Err(NotificationError::InvalidPhone(raw.to_string()));
    }
    Ok(format!("+{}", normalized))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub sid: String,
    pub status: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn deliver(
        &self,
        destination: &Destination,
        body: &str,
    ) -> Result<SendReceipt, NotificationError>;
}

#[derive(Clone)]
pub struct NotificationGateway {
    sender: Arc<dyn MessageSender>,
    default_country_code: String,
}

impl NotificationGateway {
    pub fn new(sender: Arc<dyn MessageSender>, default_country_code: impl Into<String>) -> Self {
        Self {
            sender,
            default_country_code: default_country_code.into(),
        }
    }

    #[instrument(skip(self, body), fields(channel = %channel))]
    pub async fn send(
        &self,
        to: &str,
        body: &str,
        channel: Channel,
    ) -> Result<SendReceipt, NotificationError> {
        if body.trim().is_empty() {
            return Err(NotificationError::EmptyMessage);
        }
        let destination = Destination {
            channel,
            e164: normalize_phone(to, &self.default_country_code)?,
        };

        match self.sender.deliver(&destination, body).await {
            Ok(receipt) => {
                info!(sid = %receipt.sid, status = %receipt.status, "message accepted");
                metrics::counter!("checkout.notifications.sent", 1);
                Ok(receipt)
            }
            Err(e) => {
                warn!(error = %e, code = ?e.provider_code(), "message delivery failed");
                metrics::counter!("checkout.notifications.failed", 1);
                Err(e)
            }
        }
    }

    pub async fn send_template(
        &self,
        to: &str,
        template: &MessageTemplate,
        channel: Channel,
    ) -> Result<SendReceipt, NotificationError> {
        self.send(to, &template.render(), channel).await
    }
}
