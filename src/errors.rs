use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Failure body shared by every endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "success": false,
    "error": "This phone number has already redeemed coupon INNERCIRCLE",
    "code": "duplicate_coupon_redemption",
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// Always false
    pub success: bool,
    /// Human-readable error description
    pub error: String,
    /// Machine-readable error code
    pub code: String,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid coupon: {0}")]
    InvalidCoupon(String),

    #[error("This phone number has already redeemed coupon {0}")]
    DuplicateCouponRedemption(String),

    #[error("Order creation failed: {0}")]
    OrderCreationFailed(String),

    #[error("Payment verification failed for payment {0}")]
    VerificationFailed(String),

    #[error("Notification failed: {0}")]
    NotificationFailed(String),

    #[error("Upstream request timed out: {0}")]
    Timeout(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<crate::services::payments::GatewayError> for ServiceError {
    fn from(err: crate::services::payments::GatewayError) -> Self {
        use crate::services::payments::GatewayError;
        match err {
            GatewayError::Timeout => {
                ServiceError::Timeout("payment gateway did not respond in time".into())
            }
            GatewayError::NotConfigured => ServiceError::ServiceUnavailable(err.to_string()),
            GatewayError::InvalidAmount => ServiceError::ValidationError(err.to_string()),
            GatewayError::Rejected { description, .. } => {
                ServiceError::OrderCreationFailed(description)
            }
            GatewayError::Network(_) | GatewayError::MalformedResponse(_) => {
                ServiceError::OrderCreationFailed("Unable to create payment order".into())
            }
        }
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidCoupon(_) | Self::VerificationFailed(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::DuplicateCouponRedemption(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::OrderCreationFailed(_)
            | Self::NotificationFailed(_)
            | Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::DatabaseError(_) | Self::SerializationError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::InvalidCoupon(_) => "invalid_coupon",
            Self::DuplicateCouponRedemption(_) => "duplicate_coupon_redemption",
            Self::OrderCreationFailed(_) => "order_creation_failed",
            Self::VerificationFailed(_) => "verification_failed",
            Self::NotificationFailed(_) => "notification_failed",
            Self::Timeout(_) => "timeout",
            Self::ExternalServiceError(_) => "external_service_error",
            Self::Unauthorized(_) => "unauthorized",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::SerializationError(_) | Self::InternalError(_) => "internal_error",
        }
    }

    /// Message suitable for HTTP responses. Internal errors get a generic text.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::SerializationError(_) | Self::InternalError(_) => {
                "Internal server error".to_string()
            }
            Self::DuplicateCouponRedemption(_) => "duplicate coupon redemption".to_string(),
            Self::NotificationFailed(msg)
            | Self::OrderCreationFailed(msg)
            | Self::ValidationError(msg)
            | Self::InvalidCoupon(msg) => msg.clone(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed");
        } else {
            tracing::warn!(error = %self, code = self.code(), "request rejected");
        }

        let body = ErrorResponse {
            success: false,
            error: self.response_message(),
            code: self.code().to_string(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}
