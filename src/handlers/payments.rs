use axum::{extract::State, response::Response, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use super::common::{success_response, validate_input};
use crate::{errors::ServiceError, services::payments::PaymentVerification, AppState};

/// Fields posted by the checkout widget's completion handler.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1, max = 100))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1, max = 100))]
    pub razorpay_payment_id: String,
    #[validate(length(min = 1, max = 256))]
    pub razorpay_signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
}

/// Verify a completed payment's signature
///
/// Never retried by the client; a failure after a real charge is reported
/// with the payment id so support can reconcile it.
#[utoipa::path(
    post,
    path = "/payments/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Signature valid", body = VerifyPaymentResponse),
        (status = 400, description = "Signature invalid or request malformed", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
#[instrument(skip(state, payload), fields(order_id = %payload.razorpay_order_id, payment_id = %payload.razorpay_payment_id))]
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;

    let verification = PaymentVerification {
        order_id: payload.razorpay_order_id,
        payment_id: payload.razorpay_payment_id,
        signature: payload.razorpay_signature,
    };

    if !state.payments.verify_signature(&verification) {
        warn!("payment signature mismatch");
        metrics::counter!("checkout.payments.verification_failed", 1);
        return Err(ServiceError::VerificationFailed(verification.payment_id));
    }

    info!("payment verified");
    metrics::counter!("checkout.payments.verified", 1);
    Ok(success_response(VerifyPaymentResponse {
        success: true,
        payment_id: Some(verification.payment_id),
    }))
}

pub fn payment_routes() -> Router<AppState> {
    Router::new().route("/verify", post(verify_payment))
}
