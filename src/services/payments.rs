//! Razorpay order creation and payment signature verification.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use metrics::counter;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;

type HmacSha256 = Hmac<Sha256>;

/// Razorpay limits notes to 15 keys of 256 characters each.
const MAX_NOTE_KEYS: usize = 15;
const MAX_NOTE_LEN: usize = 256;

/// Largest order accepted, in whole currency units.
pub const MAX_ORDER_AMOUNT: i64 = 10_000_000;

/// Provider-side order. Lives for one checkout attempt only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub order_id: String,
    /// Minor units (paise)
    pub amount_minor: i64,
    pub currency: String,
    pub key_id: String,
}

/// The widget callback triple, consumed once by verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVerification {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

/// Free-form attribution attached to the provider order.
pub type OrderMetadata = BTreeMap<String, String>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("payment gateway is not configured")]
    NotConfigured,
    #[error("amount must be between 1 and {}", MAX_ORDER_AMOUNT)]
    InvalidAmount,
    #[error("request to payment gateway timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("payment gateway rejected the request ({status}): {description}")]
    Rejected { status: u16, description: String },
    #[error("malformed gateway response: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// `amount` is in whole currency units and already tax-inclusive.
    async fn create_order(
        &self,
        amount: i64,
        metadata: OrderMetadata,
    ) -> Result<PaymentOrder, GatewayError>;

    /// Checks the widget's signature with the server-held secret.
    fn verify_signature(&self, verification: &PaymentVerification) -> bool;

    fn key_id(&self) -> &str;
}

#[derive(Clone, Debug)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub api_base: String,
    pub currency: String,
    pub timeout: Duration,
}

impl From<&AppConfig> for RazorpayConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            key_id: cfg.razorpay_key_id.clone(),
            key_secret: cfg.razorpay_key_secret.clone(),
            api_base: cfg.razorpay_api_base.trim_end_matches('/').to_string(),
            currency: cfg.payment_currency.clone(),
            timeout: cfg.gateway_timeout(),
        }
    }
}

#[derive(Clone)]
pub struct RazorpayClient {
    config: RazorpayConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: String,
    notes: &'a OrderMetadata,
}

#[derive(Deserialize)]
struct CreateOrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

#[derive(Deserialize)]
struct RazorpayErrorBody {
    error: RazorpayErrorDetail,
}

#[derive(Deserialize)]
struct RazorpayErrorDetail {
    #[serde(default)]
    description: Option<String>,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    fn is_configured(&self) -> bool {
        !self.config.key_id.is_empty() && !self.config.key_secret.is_empty()
    }
}

fn map_transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Network(e.to_string())
    }
}

fn clamp_notes(metadata: OrderMetadata) -> OrderMetadata {
    metadata
        .into_iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .take(MAX_NOTE_KEYS)
        .map(|(k, v)| (k, v.chars().take(MAX_NOTE_LEN).collect()))
        .collect()
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    #[instrument(skip(self, metadata))]
    async fn create_order(
        &self,
        amount: i64,
        metadata: OrderMetadata,
    ) -> Result<PaymentOrder, GatewayError> {
        if !self.is_configured() {
            return Err(GatewayError::NotConfigured);
        }
        if amount <= 0 || amount > MAX_ORDER_AMOUNT {
            return Err(GatewayError::InvalidAmount);
        }
        let amount_minor = amount.checked_mul(100).ok_or(GatewayError::InvalidAmount)?;

        let notes = clamp_notes(metadata);
        let receipt = format!("rcpt_{}", Uuid::new_v4().simple());
        let body = CreateOrderRequest {
            amount: amount_minor,
            currency: &self.config.currency,
            receipt,
            notes: &notes,
        };

        let response = self
            .client
            .post(format!("{}/v1/orders", self.config.api_base))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let description = serde_json::from_str::<RazorpayErrorBody>(&error_text)
                .ok()
                .and_then(|b| b.error.description)
                .unwrap_or(error_text);
            warn!(status = status.as_u16(), %description, "Razorpay rejected order");
            counter!("checkout.orders.rejected", 1);
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                description,
            });
        }

        let order: CreateOrderResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
        if order.id.is_empty() {
            return Err(GatewayError::MalformedResponse("missing order id".into()));
        }

        info!(order_id = %order.id, "Razorpay order created");
        counter!("checkout.orders.created", 1);
        Ok(PaymentOrder {
            order_id: order.id,
            amount_minor: order.amount,
            currency: order.currency,
            key_id: self.config.key_id.clone(),
        })
    }

    fn verify_signature(&self, verification: &PaymentVerification) -> bool {
        verify_razorpay_signature(&self.config.key_secret, verification)
    }

    fn key_id(&self) -> &str {
        &self.config.key_id
    }
}

fn payment_mac(secret: &str, order_id: &str, payment_id: &str) -> Option<HmacSha256> {
    if secret.is_empty() {
        return None;
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Some(mac)
}

/// HMAC-SHA256 of `order_id|payment_id`, hex encoded, compared in constant time.
pub fn verify_razorpay_signature(secret: &str, verification: &PaymentVerification) -> bool {
    let Ok(expected) = hex::decode(verification.signature.trim()) else {
        return false;
    };
    payment_mac(secret, &verification.order_id, &verification.payment_id)
        .map_or(false, |mac| mac.verify_slice(&expected).is_ok())
}

/// Produces the signature Razorpay would send for an order/payment pair.
pub fn sign_payment(secret: &str, order_id: &str, payment_id: &str) -> Option<String> {
    payment_mac(secret, order_id, payment_id).map(|mac| hex::encode(mac.finalize().into_bytes()))
}
