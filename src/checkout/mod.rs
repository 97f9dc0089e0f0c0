//! Headless checkout controller.
//!
//! Mirrors what the checkout page does in the browser: load the payment
//! script, apply or remove a coupon, validate the form, then either record a
//! free registration or run order creation, the payment window and signature
//! verification before recording a paid one. Every collaborator sits behind a
//! trait so the flow runs against the real HTTP routes or against fakes.

pub mod client;
pub mod controller;
pub mod form;
pub mod script;
pub mod session;
pub mod widget;

pub use client::{BackendError, CheckoutBackend, HttpCheckoutBackend};
pub use controller::{CheckoutConfig, CheckoutController};
pub use form::{utm_from_query, CheckoutForm, FieldErrors};
pub use script::{HttpScriptLoader, ScriptError, ScriptLoader, DEFAULT_CHECKOUT_SCRIPT_URL};
pub use session::{
    CheckoutContext, CheckoutFailure, CheckoutSession, CouponState, FailureKind, Phase, PhaseKind,
    Toast, ToastKind,
};
pub use widget::{ChannelPaymentWidget, PaymentWidget, Prefill, WidgetOrder, WidgetOutcome, WidgetRequest};
