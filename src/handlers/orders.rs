use axum::{extract::State, response::Response, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use super::common::{success_response, validate_input};
use crate::{
    errors::ServiceError,
    services::payments::OrderMetadata,
    validation::{non_empty, validate_email, validate_gstin, validate_name, validate_phone, validate_utm},
    AppState,
};

/// Checkout form as submitted for a paid order.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(custom = "validate_name")]
    pub first_name: String,
    #[validate(custom = "validate_name")]
    pub last_name: String,
    #[validate(custom = "validate_email")]
    pub email: String,
    #[validate(custom = "validate_phone")]
    pub phone: String,
    #[validate(length(min = 1, max = 200, message = "Company name is required"))]
    pub company_name: String,
    #[serde(default)]
    #[validate(custom = "validate_gstin")]
    pub gst_number: Option<String>,
    /// Whole currency units, tax-inclusive
    #[validate(range(min = 1, max = 10000000, message = "Amount must be between 1 and 10000000"))]
    pub amount: i64,
    #[serde(default)]
    pub is_event: bool,
    #[validate(length(min = 1, max = 200))]
    pub paid_for: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub why_to_attend: Option<String>,
    #[serde(default, rename = "utm_source")]
    #[validate(custom = "validate_utm")]
    pub utm_source: Option<String>,
    #[serde(default, rename = "utm_medium")]
    #[validate(custom = "validate_utm")]
    pub utm_medium: Option<String>,
    #[serde(default, rename = "utm_campaign")]
    #[validate(custom = "validate_utm")]
    pub utm_campaign: Option<String>,
}

impl CreateOrderRequest {
    fn metadata(&self) -> OrderMetadata {
        let mut notes = OrderMetadata::new();
        notes.insert(
            "name".into(),
            format!("{} {}", self.first_name.trim(), self.last_name.trim()),
        );
        notes.insert("email".into(), self.email.trim().to_string());
        notes.insert("phone".into(), self.phone.trim().to_string());
        notes.insert("company_name".into(), self.company_name.trim().to_string());
        notes.insert("paid_for".into(), self.paid_for.trim().to_string());
        notes.insert("is_event".into(), self.is_event.to_string());
        let optional = [
            ("gst_number", &self.gst_number),
            ("why_to_attend", &self.why_to_attend),
            ("utm_source", &self.utm_source),
            ("utm_medium", &self.utm_medium),
            ("utm_campaign", &self.utm_campaign),
        ];
        for (key, value) in optional {
            if let Some(value) = non_empty(value.clone()) {
                notes.insert(key.to_string(), value);
            }
        }
        notes
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderSummary {
    pub id: String,
    /// Minor units, as the checkout widget expects
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order: OrderSummary,
    /// Public key for the checkout widget
    pub key_id: String,
}

/// Create a payment-provider order for the checkout widget
#[utoipa::path(
    post,
    path = "/orders/create",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order created", body = CreateOrderResponse,
            headers(("X-Request-Id" = String, description = "Unique request identifier"))
        ),
        (status = 400, description = "Invalid form", body = crate::errors::ErrorResponse),
        (status = 502, description = "Provider rejected the order", body = crate::errors::ErrorResponse),
        (status = 504, description = "Provider timed out", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
#[instrument(skip(state, payload), fields(paid_for = %payload.paid_for, amount = payload.amount))]
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;

    let order = state
        .payments
        .create_order(payload.amount, payload.metadata())
        .await?;

    info!(order_id = %order.order_id, "checkout order ready");
    Ok(success_response(CreateOrderResponse {
        success: true,
        order: OrderSummary {
            id: order.order_id,
            amount: order.amount_minor,
            currency: order.currency,
        },
        key_id: order.key_id,
    }))
}

pub fn order_routes() -> Router<AppState> {
    Router::new().route("/create", post(create_order))
}
