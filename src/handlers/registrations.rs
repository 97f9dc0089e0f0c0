use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::common::{created_response, success_response, validate_input};
use crate::{
    errors::ServiceError,
    services::registrations::{NewRegistration, UtmParams},
    validation::{non_empty, validate_email, validate_gstin, validate_name, validate_phone, validate_utm},
    AppState,
};

/// Registration payload. Accepts both the camelCase names the checkout form
/// sends and their snake_case equivalents.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(custom = "validate_name")]
    pub name: String,
    #[serde(default, alias = "businessName", alias = "companyName")]
    #[validate(length(max = 200))]
    pub business_name: Option<String>,
    #[validate(custom = "validate_email")]
    pub email: String,
    #[validate(custom = "validate_phone")]
    pub phone: String,
    #[serde(default, alias = "gstNumber")]
    #[validate(custom = "validate_gstin")]
    pub gst_number: Option<String>,
    #[serde(default, alias = "reasonToAttend", alias = "whyToAttend")]
    #[validate(length(max = 1000))]
    pub reason_to_attend: Option<String>,
    #[serde(default, rename = "eventSlug", alias = "event_slug")]
    pub event_slug: Option<String>,
    #[serde(default, rename = "couponCode", alias = "coupon_code")]
    pub coupon_code: Option<String>,
    #[validate(range(min = 0, message = "Amount cannot be negative"))]
    pub amount: i64,
    #[serde(rename = "paidFor", alias = "paid_for")]
    #[validate(length(min = 1, max = 200))]
    pub paid_for: String,
    #[serde(default, rename = "isEvent", alias = "is_event")]
    pub is_event: bool,
    #[serde(default, rename = "referredBy", alias = "referred_by")]
    #[validate(length(max = 200))]
    pub referred_by: Option<String>,
    #[serde(default, rename = "paymentId", alias = "payment_id")]
    pub payment_id: Option<String>,
    #[serde(default, rename = "orderId", alias = "order_id")]
    pub order_id: Option<String>,
    /// Widget signature over `orderId|paymentId`; required unless a coupon waives payment.
    #[serde(default, rename = "paymentSignature", alias = "razorpay_signature")]
    #[validate(length(max = 256))]
    pub payment_signature: Option<String>,
    #[serde(default)]
    #[validate(custom = "validate_utm")]
    pub utm_source: Option<String>,
    #[serde(default)]
    #[validate(custom = "validate_utm")]
    pub utm_medium: Option<String>,
    #[serde(default)]
    #[validate(custom = "validate_utm")]
    pub utm_campaign: Option<String>,
}

impl From<RegisterRequest> for NewRegistration {
    fn from(req: RegisterRequest) -> Self {
        NewRegistration {
            name: req.name,
            email: req.email,
            phone: req.phone,
            business_name: non_empty(req.business_name),
            gst_number: non_empty(req.gst_number),
            reason_to_attend: non_empty(req.reason_to_attend),
            referred_by: non_empty(req.referred_by),
            event_slug: non_empty(req.event_slug),
            amount: req.amount,
            paid_for: req.paid_for.trim().to_string(),
            is_event: req.is_event,
            coupon_code: non_empty(req.coupon_code),
            payment_id: non_empty(req.payment_id),
            order_id: non_empty(req.order_id),
            payment_signature: non_empty(req.payment_signature),
            utm: UtmParams {
                source: non_empty(req.utm_source),
                medium: non_empty(req.utm_medium),
                campaign: non_empty(req.utm_campaign),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub success: bool,
    #[serde(rename = "registrationId")]
    pub registration_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegistrationView {
    pub id: Uuid,
    pub paid_for: String,
    pub amount: i64,
    pub coupon_code: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Record a registration
#[utoipa::path(
    post,
    path = "/registrations",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration recorded", body = RegisterResponse),
        (status = 400, description = "Invalid form, coupon or payment signature", body = crate::errors::ErrorResponse),
        (status = 409, description = "Coupon already redeemed by this phone", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
#[instrument(skip(state, payload))]
pub async fn create_registration(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let saved = state.registrations.register(payload.into()).await?;
    Ok(created_response(RegisterResponse {
        success: true,
        registration_id: saved.id,
    }))
}

/// Look up a registration summary for the success page
#[utoipa::path(
    get,
    path = "/registrations/{id}",
    params(("id" = Uuid, Path, description = "Registration ID")),
    responses(
        (status = 200, description = "Registration summary", body = RegistrationView),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn get_registration(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let saved = state
        .registrations
        .find(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("registration {}", id)))?;
    Ok(success_response(RegistrationView {
        id: saved.id,
        paid_for: saved.paid_for,
        amount: saved.amount,
        coupon_code: saved.coupon_code,
        created_at: saved.created_at,
    }))
}

pub fn registration_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_registration))
        .route("/:id", get(get_registration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_camel_case_form_fields() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "name": "Asha Rao",
            "businessName": "Acme",
            "email": "asha@x.com",
            "phone": "9876543210",
            "couponCode": "innercircle",
            "amount": 0,
            "paidFor": "Inner Circle Membership",
            "utm_source": "",
            "utm_campaign": "launch"
        }))
        .unwrap();
        assert!(req.validate().is_ok());

        let new: NewRegistration = req.into();
        assert_eq!(new.business_name.as_deref(), Some("Acme"));
        assert_eq!(new.coupon_code.as_deref(), Some("innercircle"));
        assert_eq!(new.utm.source, None);
        assert_eq!(new.utm.campaign.as_deref(), Some("launch"));
    }

    #[test]
    fn carries_the_payment_triple() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "name": "Asha Rao",
            "email": "asha@x.com",
            "phone": "9876543210",
            "amount": 1770,
            "paidFor": "Chapter Meeting",
            "paymentId": "pay_1",
            "orderId": "order_1",
            "razorpay_signature": "abc123"
        }))
        .unwrap();
        let new: NewRegistration = req.into();
        assert_eq!(new.payment_id.as_deref(), Some("pay_1"));
        assert_eq!(new.order_id.as_deref(), Some("order_1"));
        assert_eq!(new.payment_signature.as_deref(), Some("abc123"));
    }
}
