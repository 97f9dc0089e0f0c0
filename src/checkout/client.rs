//! Talks to the checkout backend routes over HTTP.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::errors::ErrorResponse;
use crate::handlers::{
    orders::{CreateOrderRequest, CreateOrderResponse},
    payments::{VerifyPaymentRequest, VerifyPaymentResponse},
    registrations::{RegisterRequest, RegisterResponse},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("{0}")]
    DuplicateCoupon(String),
    #[error("backend returned {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

impl BackendError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_decode() {
            BackendError::Malformed(err.to_string())
        } else {
            BackendError::Network(err.to_string())
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckoutBackend: Send + Sync {
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<CreateOrderResponse, BackendError>;

    /// `Ok(false)` means the backend looked at the signature and rejected it.
    async fn verify_payment(&self, request: &VerifyPaymentRequest) -> Result<bool, BackendError>;

    async fn register(&self, request: &RegisterRequest) -> Result<Uuid, BackendError>;
}

pub struct HttpCheckoutBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCheckoutBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn error_body(response: reqwest::Response) -> (u16, ErrorResponse) {
        let status = response.status().as_u16();
        let body = response.json::<ErrorResponse>().await.unwrap_or_else(|_| ErrorResponse {
            success: false,
            error: format!("HTTP {}", status),
            code: String::new(),
            request_id: None,
            timestamp: String::new(),
        });
        (status, body)
    }
}

#[async_trait]
impl CheckoutBackend for HttpCheckoutBackend {
    #[instrument(skip(self, request), fields(amount = request.amount))]
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<CreateOrderResponse, BackendError> {
        let response = self
            .client
            .post(self.url("/orders/create"))
            .json(request)
            .send()
            .await
            .map_err(BackendError::from_reqwest)?;

        if response.status() != StatusCode::OK {
            let (status, body) = Self::error_body(response).await;
            return Err(BackendError::Rejected {
                status,
                message: body.error,
            });
        }

        let order: CreateOrderResponse =
            response.json().await.map_err(BackendError::from_reqwest)?;
        if !order.success || order.order.id.is_empty() {
            return Err(BackendError::Malformed("order response without an id".into()));
        }
        debug!(order_id = %order.order.id, "order created");
        Ok(order)
    }

    #[instrument(skip(self, request), fields(payment_id = %request.razorpay_payment_id))]
    async fn verify_payment(&self, request: &VerifyPaymentRequest) -> Result<bool, BackendError> {
        let response = self
            .client
            .post(self.url("/payments/verify"))
            .json(request)
            .send()
            .await
            .map_err(BackendError::from_reqwest)?;

        if response.status() == StatusCode::OK {
            let body: VerifyPaymentResponse =
                response.json().await.map_err(BackendError::from_reqwest)?;
            return Ok(body.success);
        }
        let (status, body) = Self::error_body(response).await;
        if status == 400 && body.code == "verification_failed" {
            return Ok(false);
        }
        Err(BackendError::Rejected {
            status,
            message: body.error,
        })
    }

    #[instrument(skip(self, request), fields(paid_for = %request.paid_for, amount = request.amount))]
    async fn register(&self, request: &RegisterRequest) -> Result<Uuid, BackendError> {
        let response = self
            .client
            .post(self.url("/registrations"))
            .json(request)
            .send()
            .await
            .map_err(BackendError::from_reqwest)?;

        match response.status() {
            StatusCode::CREATED | StatusCode::OK => {
                let body: RegisterResponse =
                    response.json().await.map_err(BackendError::from_reqwest)?;
                Ok(body.registration_id)
            }
            StatusCode::CONFLICT => {
                let (_, body) = Self::error_body(response).await;
                Err(BackendError::DuplicateCoupon(body.error))
            }
            _ => {
                let (status, body) = Self::error_body(response).await;
                Err(BackendError::Rejected {
                    status,
                    message: body.error,
                })
            }
        }
    }
}
