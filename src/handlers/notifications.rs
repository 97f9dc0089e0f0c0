use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;
use validator::Validate;

use super::common::validate_input;
use crate::{
    errors::ServiceError,
    notifications::{Channel, NotificationError},
    AppState,
};

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SendNotificationRequest {
    #[validate(length(min = 1, max = 32))]
    pub to: String,
    #[validate(length(min = 1, max = 1600))]
    pub message: String,
    /// `sms` (default) or `whatsapp`
    #[serde(default, rename = "type")]
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SendNotificationResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Provider error code, when the provider supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
}

fn failure_status(err: &NotificationError) -> StatusCode {
    match err {
        NotificationError::InvalidPhone(_)
        | NotificationError::EmptyMessage
        | NotificationError::UnsupportedChannel(_) => StatusCode::BAD_REQUEST,
        NotificationError::NotConfigured(_)
        | NotificationError::QueueFull
        | NotificationError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
        NotificationError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        NotificationError::Provider { .. } | NotificationError::Network(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ServiceError> {
    let Some(expected) = state.config.notifications_api_key.as_deref() else {
        return Ok(());
    };
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if constant_time_eq(expected, provided) {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized("missing or invalid API key".into()))
    }
}

/// Send a single SMS or WhatsApp message
#[utoipa::path(
    post,
    path = "/notifications/send",
    request_body = SendNotificationRequest,
    responses(
        (status = 200, description = "Message accepted by the provider", body = SendNotificationResponse),
        (status = 400, description = "Invalid destination or body", body = SendNotificationResponse),
        (status = 401, description = "Missing API key", body = crate::errors::ErrorResponse),
        (status = 502, description = "Provider error", body = SendNotificationResponse)
    ),
    tag = "Notifications"
)]
#[instrument(skip(state, headers, payload))]
pub async fn send_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SendNotificationRequest>,
) -> Result<Response, ServiceError> {
    authorize(&state, &headers)?;
    validate_input(&payload)?;

    let channel = match payload.channel.as_deref() {
        None | Some("") => Ok(Channel::Sms),
        Some(raw) => raw.parse::<Channel>(),
    };

    let result = match channel {
        Ok(channel) => {
            state
                .notifications
                .send(&payload.to, &payload.message, channel)
                .await
        }
        Err(e) => Err(e),
    };

    let response = match result {
        Ok(receipt) => (
            StatusCode::OK,
            Json(SendNotificationResponse {
                success: true,
                sid: Some(receipt.sid),
                status: Some(receipt.status),
                ..Default::default()
            }),
        ),
        Err(e) => (
            failure_status(&e),
            Json(SendNotificationResponse {
                success: false,
                code: e.provider_code(),
                error: Some(e.to_string()),
                ..Default::default()
            }),
        ),
    };
    Ok(response.into_response())
}

pub fn notification_routes() -> Router<AppState> {
    Router::new().route("/send", post(send_notification))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_statuses() {
        assert_eq!(
            failure_status(&NotificationError::InvalidPhone("1".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            failure_status(&NotificationError::Provider {
                code: Some(20003),
                reason: "auth".into()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            failure_status(&NotificationError::Timeout),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn constant_time_comparison() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
    }
}
