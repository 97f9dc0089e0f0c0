//! Membership checkout backend
//!
//! HTTP endpoints for order creation, payment verification, registration
//! and notifications, plus a headless [`checkout`] controller that drives
//! them the way the checkout page does.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod checkout;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod notifications;
pub mod openapi;
pub mod services;
pub mod tracing;
pub mod validation;

use axum::{routing::get, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::compression::CompressionLayer;
use utoipa::ToSchema;

use crate::{
    config::AppConfig,
    notifications::{
        twilio::TwilioConfig, Channel, LoggingSender, MessageSender, NotificationDispatcher,
        NotificationGateway, TwilioSender,
    },
    services::{
        coupons::{CouponRegistry, StaticCouponRegistry},
        payments::{PaymentGateway, RazorpayClient, RazorpayConfig},
        pricing::gst_rate_from_f64,
        registrations::RegistrationService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub payments: Arc<dyn PaymentGateway>,
    pub coupons: Arc<dyn CouponRegistry>,
    pub registrations: RegistrationService,
    pub notifications: NotificationGateway,
    pub gst_rate: Decimal,
}

impl AppState {
    /// Wires state from explicit collaborators. `dispatcher` receives the
    /// post-registration messages.
    pub fn assemble(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        payments: Arc<dyn PaymentGateway>,
        sender: Arc<dyn MessageSender>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        let coupons: Arc<dyn CouponRegistry> = Arc::new(StaticCouponRegistry::default());
        let channel = config
            .registration_notification_channel
            .parse::<Channel>()
            .unwrap_or(Channel::Whatsapp);
        let registrations = RegistrationService::new(
            db.clone(),
            coupons.clone(),
            payments.clone(),
            &config.default_country_code,
        )
        .with_notifications(dispatcher, channel);

        Self {
            notifications: NotificationGateway::new(sender, &config.default_country_code),
            gst_rate: gst_rate_from_f64(config.gst_rate),
            db,
            payments,
            coupons,
            registrations,
            config,
        }
    }

    /// Builds the production collaborators from configuration and starts the
    /// notification worker.
    pub fn from_config(db: Arc<DatabaseConnection>, config: AppConfig) -> (Self, JoinHandle<()>) {
        let payments: Arc<dyn PaymentGateway> =
            Arc::new(RazorpayClient::new(RazorpayConfig::from(&config)));

        let sender: Arc<dyn MessageSender> = match TwilioConfig::from_app_config(&config) {
            Some(twilio) => {
                ::tracing::info!("Twilio messaging enabled");
                Arc::new(TwilioSender::new(twilio))
            }
            None => {
                ::tracing::warn!("Twilio credentials not configured; messages will only be logged");
                Arc::new(LoggingSender)
            }
        };

        let (dispatcher, worker) = NotificationDispatcher::spawn(
            NotificationGateway::new(sender.clone(), &config.default_country_code),
            config.notification_queue_capacity,
        );

        let state = Self::assemble(db, Arc::new(config), payments, sender, dispatcher);
        (state, worker)
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Checkout, registration, notification and plan routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/orders", handlers::orders::order_routes())
        .nest("/payments", handlers::payments::payment_routes())
        .nest("/registrations", handlers::registrations::registration_routes())
        .nest("/notifications", handlers::notifications::notification_routes())
        .nest("/plans", handlers::plans::plan_routes())
        .nest("/health", handlers::health::health_routes())
}

/// The full application minus CORS, which depends on deployment config.
pub fn build_router(state: AppState) -> Router {
    Router::<AppState>::new()
        .route("/", get(|| async { "membership-checkout up" }))
        .merge(api_routes())
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
