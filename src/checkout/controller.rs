use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use super::client::{BackendError, CheckoutBackend};
use super::form::CheckoutForm;
use super::script::ScriptLoader;
use super::session::{
    CheckoutFailure, CheckoutSession, FailureKind, Phase, PhaseKind, Toast,
};
use super::widget::{PaymentWidget, Prefill, WidgetOrder, WidgetOutcome};
use crate::handlers::{
    orders::CreateOrderRequest, payments::VerifyPaymentRequest, registrations::RegisterRequest,
};
use crate::services::coupons::CouponRegistry;
use crate::services::payments::PaymentVerification;
use crate::services::registrations::UtmParams;
use crate::validation::non_empty;

const SCRIPT_LOAD_FAILED: &str =
    "Failed to load payment system. Please check your connection and try again.";
const ORDER_FAILED: &str = "Unable to create payment order. Please try again.";
const ORDER_TIMED_OUT: &str = "Creating your order timed out. Please try again.";
const PAYMENT_CANCELLED: &str = "Payment cancelled. You can try again whenever you are ready.";
const DUPLICATE_COUPON: &str =
    "This phone number has already redeemed this coupon. Each number can use it only once.";
const ALREADY_SUBMITTING: &str = "Your request is already being processed.";

#[derive(Clone, Debug)]
pub struct CheckoutConfig {
    /// Cap on each backend call
    pub request_timeout: Duration,
    pub support_contact: String,
    /// Shown as the merchant name in the payment window
    pub organization_name: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            support_contact: "support".into(),
            organization_name: "Membership Checkout".into(),
        }
    }
}

/// Drives one checkout page: script loading, coupons, submission and the
/// redirect. Each operation takes the current session and returns the next.
pub struct CheckoutController {
    backend: Arc<dyn CheckoutBackend>,
    widget: Arc<dyn PaymentWidget>,
    script: Arc<dyn ScriptLoader>,
    coupons: Arc<dyn CouponRegistry>,
    config: CheckoutConfig,
    observer: Option<mpsc::UnboundedSender<PhaseKind>>,
}

impl CheckoutController {
    pub fn new(
        backend: Arc<dyn CheckoutBackend>,
        widget: Arc<dyn PaymentWidget>,
        script: Arc<dyn ScriptLoader>,
        coupons: Arc<dyn CouponRegistry>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            backend,
            widget,
            script,
            coupons,
            config,
            observer: None,
        }
    }

    /// Reports every phase change to `observer`.
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<PhaseKind>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn enter(&self, session: CheckoutSession, phase: Phase) -> CheckoutSession {
        self.notify(phase.kind());
        session.with_phase(phase)
    }

    fn fail(&self, session: CheckoutSession, failure: CheckoutFailure) -> CheckoutSession {
        warn!(session_id = %session.id, kind = ?failure.kind, "checkout failed");
        self.notify(PhaseKind::Error);
        session.fail(failure)
    }

    fn notify(&self, kind: PhaseKind) {
        if let Some(observer) = &self.observer {
            let _ = observer.send(kind);
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, BackendError>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        tokio::time::timeout(self.config.request_timeout, call)
            .await
            .unwrap_or(Err(BackendError::Timeout))
    }

    /// Loads the provider script if it is not already present.
    pub async fn load_payment_script(&self, session: CheckoutSession) -> CheckoutSession {
        if self.script.is_loaded() {
            return self.enter(session, Phase::Ready);
        }
        let session = self.enter(session, Phase::ScriptLoading);
        match self.script.load().await {
            Ok(()) => self.enter(session, Phase::Ready),
            Err(err) => {
                warn!(error = %err, "payment script failed to load");
                self.fail(
                    session,
                    CheckoutFailure::new(FailureKind::ScriptLoad, SCRIPT_LOAD_FAILED),
                )
            }
        }
    }

    pub async fn retry_script_load(&self, session: CheckoutSession) -> CheckoutSession {
        let session = session.dismiss_toast();
        self.load_payment_script(session).await
    }

    pub fn apply_coupon(&self, session: CheckoutSession, code: &str) -> CheckoutSession {
        session.apply_coupon(self.coupons.as_ref(), code)
    }

    pub fn remove_coupon(&self, session: CheckoutSession) -> CheckoutSession {
        session.remove_coupon()
    }

    /// Validates the form and runs either the free or the paid branch.
    #[instrument(skip(self, session, form, utm), fields(session_id = %session.id, amount = session.amount))]
    pub async fn submit(
        &self,
        mut session: CheckoutSession,
        form: &CheckoutForm,
        utm: &UtmParams,
    ) -> CheckoutSession {
        if session.phase == Phase::Submitting {
            let failure = CheckoutFailure::new(FailureKind::AlreadySubmitting, ALREADY_SUBMITTING);
            session.toast = Some(Toast::error(&failure));
            return session;
        }
        // Finished, or money has moved and only support can resolve it.
        let settled = match &session.phase {
            Phase::Success { .. } => true,
            Phase::Error(failure) => failure.payment_id.is_some(),
            _ => false,
        };
        if settled {
            return session;
        }

        if let Err(errors) = form.validate(session.context.is_event) {
            session.field_errors = errors;
            return session;
        }
        session.field_errors.clear();
        session.toast = None;

        if session.is_free() {
            self.submit_free(session, form, utm).await
        } else {
            self.submit_paid(session, form, utm).await
        }
    }

    async fn submit_free(
        &self,
        session: CheckoutSession,
        form: &CheckoutForm,
        utm: &UtmParams,
    ) -> CheckoutSession {
        let session = self.enter(session, Phase::Submitting);
        let request = registration_request(&session, form, utm, None);

        match self.bounded(self.backend.register(&request)).await {
            Ok(registration_id) => {
                info!(%registration_id, "coupon registration recorded");
                let redirect = free_redirect(
                    &registration_id.to_string(),
                    &session.context.paid_for,
                    session.applied_coupon().unwrap_or_default(),
                );
                self.enter(session, Phase::Success { redirect })
            }
            Err(err) => {
                let failure = registration_failure(&err);
                self.fail(session, failure)
            }
        }
    }

    async fn submit_paid(
        &self,
        session: CheckoutSession,
        form: &CheckoutForm,
        utm: &UtmParams,
    ) -> CheckoutSession {
        let session = if self.script.is_loaded() {
            session
        } else {
            let session = self.load_payment_script(session).await;
            if matches!(session.phase, Phase::Error(_)) {
                return session;
            }
            session
        };
        let session = self.enter(session, Phase::Submitting);

        let order_request = order_request(&session, form, utm);
        let order = match self.bounded(self.backend.create_order(&order_request)).await {
            Ok(order) => order,
            Err(BackendError::Timeout) => {
                return self.fail(session, CheckoutFailure::new(FailureKind::Timeout, ORDER_TIMED_OUT))
            }
            Err(err) => {
                warn!(error = %err, "order creation failed");
                return self.fail(session, CheckoutFailure::new(FailureKind::Order, ORDER_FAILED));
            }
        };
        info!(order_id = %order.order.id, "opening payment window");

        let widget_order = WidgetOrder {
            key: order.key_id.clone(),
            order_id: order.order.id.clone(),
            amount: order.order.amount,
            currency: order.order.currency.clone(),
            name: self.config.organization_name.clone(),
            description: session.context.paid_for.clone(),
            theme_color: session.context.color.clone(),
            notes: BTreeMap::from([
                ("paid_for".to_string(), session.context.paid_for.clone()),
                ("email".to_string(), form.email.trim().to_string()),
            ]),
        };
        let prefill = Prefill {
            name: form.full_name(),
            email: form.email.trim().to_string(),
            contact: form.phone.trim().to_string(),
        };

        let verification = match self.widget.open(&widget_order, &prefill).await {
            WidgetOutcome::Completed(verification) => verification,
            WidgetOutcome::Dismissed => {
                info!(order_id = %widget_order.order_id, "payment window dismissed");
                let mut session = self.enter(session, Phase::Ready);
                session.toast = Some(Toast::info(PAYMENT_CANCELLED));
                return session;
            }
            WidgetOutcome::Failed { description } => {
                return self.fail(
                    session,
                    CheckoutFailure::new(
                        FailureKind::PaymentFailed,
                        format!("Payment failed: {}", description),
                    ),
                );
            }
        };

        if let Err(failure) = self.verify(&verification).await {
            return self.fail(session, failure);
        }

        let request = registration_request(&session, form, utm, Some(&verification));
        match self.bounded(self.backend.register(&request)).await {
            Ok(registration_id) => {
                info!(%registration_id, payment_id = %verification.payment_id, "paid registration recorded");
                let redirect = paid_redirect(
                    &verification.payment_id,
                    &session.context.paid_for,
                    session.amount,
                    &session.context.color,
                );
                self.enter(session, Phase::Success { redirect })
            }
            Err(err) => {
                warn!(error = %err, payment_id = %verification.payment_id, "registration after payment failed");
                let failure = CheckoutFailure::new(
                    FailureKind::Registration,
                    format!(
                        "Your payment ({}) was received but we could not save your registration. Please contact {} with this payment ID.",
                        verification.payment_id, self.config.support_contact
                    ),
                )
                .with_payment(&verification.payment_id);
                self.fail(session, failure)
            }
        }
    }

    /// Exactly one verify call; never retried.
    async fn verify(&self, verification: &PaymentVerification) -> Result<(), CheckoutFailure> {
        let request = VerifyPaymentRequest {
            razorpay_order_id: verification.order_id.clone(),
            razorpay_payment_id: verification.payment_id.clone(),
            razorpay_signature: verification.signature.clone(),
        };
        let payment_id = &verification.payment_id;
        match self.bounded(self.backend.verify_payment(&request)).await {
            Ok(true) => Ok(()),
            Err(BackendError::Timeout) => Err(CheckoutFailure::new(
                FailureKind::Timeout,
                format!(
                    "Payment verification timed out. Please contact {} with payment ID {}.",
                    self.config.support_contact, payment_id
                ),
            )
            .with_payment(payment_id)),
            outcome => {
                if let Err(err) = &outcome {
                    warn!(error = %err, %payment_id, "verification request failed");
                }
                Err(CheckoutFailure::new(
                    FailureKind::Verification,
                    format!(
                        "Payment verification failed. Please contact {} with payment ID {}.",
                        self.config.support_contact, payment_id
                    ),
                )
                .with_payment(payment_id))
            }
        }
    }
}

fn registration_failure(err: &BackendError) -> CheckoutFailure {
    match err {
        BackendError::DuplicateCoupon(_) => {
            CheckoutFailure::new(FailureKind::DuplicateCoupon, DUPLICATE_COUPON)
        }
        BackendError::Timeout => CheckoutFailure::new(
            FailureKind::Timeout,
            "Registration timed out. Please try again.",
        ),
        _ => CheckoutFailure::new(
            FailureKind::Registration,
            "Registration failed. Please try again.",
        ),
    }
}

fn order_request(session: &CheckoutSession, form: &CheckoutForm, utm: &UtmParams) -> CreateOrderRequest {
    CreateOrderRequest {
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        email: form.email.trim().to_string(),
        phone: form.phone.trim().to_string(),
        company_name: form.company_name.trim().to_string(),
        gst_number: non_empty(form.gst_number.clone()),
        amount: session.amount,
        is_event: session.context.is_event,
        paid_for: session.context.paid_for.clone(),
        why_to_attend: non_empty(form.why_to_attend.clone()),
        utm_source: utm.source.clone(),
        utm_medium: utm.medium.clone(),
        utm_campaign: utm.campaign.clone(),
    }
}

fn registration_request(
    session: &CheckoutSession,
    form: &CheckoutForm,
    utm: &UtmParams,
    payment: Option<&PaymentVerification>,
) -> RegisterRequest {
    RegisterRequest {
        name: form.full_name(),
        business_name: non_empty(Some(form.company_name.clone())),
        email: form.email.trim().to_string(),
        phone: form.phone.trim().to_string(),
        gst_number: non_empty(form.gst_number.clone()),
        reason_to_attend: non_empty(form.why_to_attend.clone()),
        event_slug: session.context.event_slug.clone(),
        coupon_code: session.applied_coupon().map(str::to_string),
        amount: session.amount,
        paid_for: session.context.paid_for.clone(),
        is_event: session.context.is_event,
        referred_by: non_empty(form.referred_by.clone()),
        payment_id: payment.map(|p| p.payment_id.clone()),
        order_id: payment.map(|p| p.order_id.clone()),
        payment_signature: payment.map(|p| p.signature.clone()),
        utm_source: utm.source.clone(),
        utm_medium: utm.medium.clone(),
        utm_campaign: utm.campaign.clone(),
    }
}

fn paid_redirect(payment_id: &str, paid_for: &str, amount: i64, color: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("payment_id", payment_id)
        .append_pair("paid_for", paid_for)
        .append_pair("amount", &amount.to_string())
        .append_pair("color", color)
        .finish();
    format!("/success?{}", query)
}

fn free_redirect(registration_id: &str, paid_for: &str, coupon: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("registration_id", registration_id)
        .append_pair("paid_for", paid_for)
        .append_pair("amount", "0")
        .append_pair("coupon", coupon)
        .finish();
    format!("/success?{}", query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::client::MockCheckoutBackend;
    use crate::checkout::script::{MockScriptLoader, ScriptError};
    use crate::checkout::session::{CheckoutContext, CouponState, ToastKind};
    use crate::checkout::widget::MockPaymentWidget;
    use crate::handlers::orders::{CreateOrderResponse, OrderSummary};
    use crate::models::find_plan;
    use crate::services::coupons::{StaticCouponRegistry, INNERCIRCLE};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn form() -> CheckoutForm {
        CheckoutForm {
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            email: "asha@x.com".into(),
            phone: "9876543210".into(),
            company_name: "Acme".into(),
            gst_number: None,
            why_to_attend: Some("networking".into()),
            referred_by: None,
        }
    }

    fn event_session() -> CheckoutSession {
        let plan = find_plan("chapter-meeting").unwrap();
        CheckoutSession::new(CheckoutContext::for_plan(plan)).with_phase(Phase::Ready)
    }

    fn membership_session() -> CheckoutSession {
        let plan = find_plan("inner-circle").unwrap();
        CheckoutSession::new(CheckoutContext::for_plan(plan)).with_phase(Phase::Ready)
    }

    fn order(id: &str, amount: i64) -> CreateOrderResponse {
        CreateOrderResponse {
            success: true,
            order: OrderSummary {
                id: id.into(),
                amount: amount * 100,
                currency: "INR".into(),
            },
            key_id: "rzp_test_key".into(),
        }
    }

    fn completed(order_id: &str, payment_id: &str) -> WidgetOutcome {
        WidgetOutcome::Completed(PaymentVerification {
            order_id: order_id.into(),
            payment_id: payment_id.into(),
            signature: "sig".into(),
        })
    }

    fn loaded_script() -> MockScriptLoader {
        let mut script = MockScriptLoader::new();
        script.expect_is_loaded().return_const(true);
        script
    }

    fn controller(
        backend: impl CheckoutBackend + 'static,
        widget: impl PaymentWidget + 'static,
        script: impl ScriptLoader + 'static,
    ) -> CheckoutController {
        CheckoutController::new(
            Arc::new(backend),
            Arc::new(widget),
            Arc::new(script),
            Arc::new(StaticCouponRegistry::default()),
            CheckoutConfig {
                support_contact: "support@example.com".into(),
                ..CheckoutConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn paid_event_checkout_end_to_end() {
        let mut backend = MockCheckoutBackend::new();
        backend
            .expect_create_order()
            .withf(|r| r.amount == 1770 && r.is_event && r.first_name == "Asha")
            .times(1)
            .returning(|_| Ok(order("order_1", 1770)));
        backend
            .expect_verify_payment()
            .withf(|r| r.razorpay_order_id == "order_1" && r.razorpay_payment_id == "pay_1")
            .times(1)
            .returning(|_| Ok(true));
        backend
            .expect_register()
            .withf(|r| {
                r.amount == 1770
                    && r.payment_id.as_deref() == Some("pay_1")
                    && r.order_id.as_deref() == Some("order_1")
                    && r.payment_signature.as_deref() == Some("sig")
                    && r.event_slug.as_deref() == Some("chapter-meeting")
                    && r.coupon_code.is_none()
            })
            .times(1)
            .returning(|_| Ok(Uuid::new_v4()));

        let mut widget = MockPaymentWidget::new();
        widget
            .expect_open()
            .withf(|o, p| o.order_id == "order_1" && o.amount == 177_000 && p.contact == "9876543210")
            .times(1)
            .returning(|_, _| completed("order_1", "pay_1"));

        let controller = controller(backend, widget, loaded_script());
        let session = controller
            .submit(event_session(), &form(), &UtmParams::default())
            .await;

        assert_matches!(&session.phase, Phase::Success { redirect } => {
            assert!(redirect.starts_with("/success?payment_id=pay_1&"));
            assert!(redirect.contains("paid_for=Chapter+Meeting"));
            assert!(redirect.contains("amount=1770"));
            assert!(redirect.contains("color=%23"));
        });
    }

    #[tokio::test]
    async fn coupon_path_skips_payment_provider() {
        let mut backend = MockCheckoutBackend::new();
        backend.expect_create_order().times(0);
        backend.expect_verify_payment().times(0);
        backend
            .expect_register()
            .withf(|r| r.amount == 0 && r.coupon_code.as_deref() == Some(INNERCIRCLE) && r.payment_id.is_none())
            .times(1)
            .returning(|_| Ok(Uuid::nil()));

        let controller = controller(backend, MockPaymentWidget::new(), MockScriptLoader::new());
        let session = controller.apply_coupon(membership_session(), "innercircle");
        assert!(session.is_free());

        let session = controller.submit(session, &form(), &UtmParams::default()).await;
        assert_matches!(&session.phase, Phase::Success { redirect } => {
            assert!(redirect.contains(&format!("registration_id={}", Uuid::nil())));
            assert!(redirect.contains("amount=0"));
            assert!(redirect.contains("coupon=INNERCIRCLE"));
        });
    }

    #[tokio::test]
    async fn duplicate_coupon_gets_specific_message() {
        let mut backend = MockCheckoutBackend::new();
        backend
            .expect_register()
            .times(1)
            .returning(|_| Err(BackendError::DuplicateCoupon("duplicate coupon redemption".into())));

        let controller = controller(backend, MockPaymentWidget::new(), MockScriptLoader::new());
        let session = controller.apply_coupon(membership_session(), INNERCIRCLE);
        let session = controller.submit(session, &form(), &UtmParams::default()).await;

        assert_matches!(&session.phase, Phase::Error(f) => {
            assert_eq!(f.kind, FailureKind::DuplicateCoupon);
            assert_eq!(f.message, DUPLICATE_COUPON);
        });
    }

    #[tokio::test]
    async fn rejected_signature_never_registers() {
        let mut backend = MockCheckoutBackend::new();
        backend
            .expect_create_order()
            .times(1)
            .returning(|_| Ok(order("order_1", 1770)));
        backend.expect_verify_payment().times(1).returning(|_| Ok(false));
        backend.expect_register().times(0);

        let mut widget = MockPaymentWidget::new();
        widget
            .expect_open()
            .times(1)
            .returning(|_, _| completed("order_1", "pay_42"));

        let controller = controller(backend, widget, loaded_script());
        let session = controller
            .submit(event_session(), &form(), &UtmParams::default())
            .await;

        assert_matches!(&session.phase, Phase::Error(f) => {
            assert_eq!(f.kind, FailureKind::Verification);
            assert!(f.message.contains("pay_42"));
            assert!(f.message.contains("support@example.com"));
            assert!(!f.retryable);
            assert_eq!(f.payment_id.as_deref(), Some("pay_42"));
        });

        // Terminal: a second submit does nothing.
        let again = controller.submit(session.clone(), &form(), &UtmParams::default()).await;
        assert_eq!(again, session);
    }

    #[tokio::test]
    async fn dismissal_returns_to_ready_and_resubmit_uses_fresh_order() {
        let orders = Arc::new(AtomicUsize::new(0));
        let mut backend = MockCheckoutBackend::new();
        let counter = orders.clone();
        backend.expect_create_order().times(2).returning(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(order(&format!("order_{}", n), 1770))
        });
        backend.expect_verify_payment().times(1).returning(|_| Ok(true));
        backend.expect_register().times(1).returning(|_| Ok(Uuid::new_v4()));

        let mut widget = MockPaymentWidget::new();
        let mut seq = mockall::Sequence::new();
        widget
            .expect_open()
            .withf(|o, _| o.order_id == "order_1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| WidgetOutcome::Dismissed);
        widget
            .expect_open()
            .withf(|o, _| o.order_id == "order_2")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| completed("order_2", "pay_2"));

        let controller = controller(backend, widget, loaded_script());
        let session = controller
            .submit(event_session(), &form(), &UtmParams::default())
            .await;
        assert_eq!(session.phase, Phase::Ready);
        let toast = session.toast.clone().unwrap();
        assert_eq!(toast.kind, ToastKind::Info);
        assert_eq!(toast.message, PAYMENT_CANCELLED);

        let session = controller.submit(session, &form(), &UtmParams::default()).await;
        assert_matches!(session.phase, Phase::Success { .. });
        assert_eq!(orders.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn provider_failure_shows_provider_description() {
        let mut backend = MockCheckoutBackend::new();
        backend
            .expect_create_order()
            .times(1)
            .returning(|_| Ok(order("order_1", 1770)));
        backend.expect_verify_payment().times(0);

        let mut widget = MockPaymentWidget::new();
        widget.expect_open().returning(|_, _| WidgetOutcome::Failed {
            description: "Card declined by bank".into(),
        });

        let controller = controller(backend, widget, loaded_script());
        let session = controller
            .submit(event_session(), &form(), &UtmParams::default())
            .await;
        assert_matches!(&session.phase, Phase::Error(f) => {
            assert_eq!(f.kind, FailureKind::PaymentFailed);
            assert_eq!(f.message, "Payment failed: Card declined by bank");
        });
        assert!(session.toast.unwrap().auto_dismiss);
    }

    #[tokio::test]
    async fn invalid_form_makes_no_calls() {
        let controller = controller(
            MockCheckoutBackend::new(),
            MockPaymentWidget::new(),
            MockScriptLoader::new(),
        );
        let bad = CheckoutForm {
            phone: "123".into(),
            ..form()
        };
        let session = controller.submit(event_session(), &bad, &UtmParams::default()).await;
        assert_eq!(session.phase, Phase::Ready);
        assert!(session.field_errors.contains_key("phone"));
    }

    #[tokio::test]
    async fn submitting_session_rejects_second_submit() {
        let controller = controller(
            MockCheckoutBackend::new(),
            MockPaymentWidget::new(),
            MockScriptLoader::new(),
        );
        let busy = event_session().with_phase(Phase::Submitting);
        let session = controller.submit(busy, &form(), &UtmParams::default()).await;
        assert_eq!(session.phase, Phase::Submitting);
        assert_eq!(session.toast.unwrap().message, ALREADY_SUBMITTING);
    }

    struct StalledBackend;

    #[async_trait]
    impl CheckoutBackend for StalledBackend {
        async fn create_order(
            &self,
            _request: &CreateOrderRequest,
        ) -> Result<CreateOrderResponse, BackendError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(order("order_late", 1770))
        }

        async fn verify_payment(&self, _request: &VerifyPaymentRequest) -> Result<bool, BackendError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(true)
        }

        async fn register(&self, _request: &RegisterRequest) -> Result<Uuid, BackendError> {
            unreachable!("registration must not run after a timeout")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn order_timeout_is_distinct() {
        let controller = controller(StalledBackend, MockPaymentWidget::new(), loaded_script());
        let session = controller
            .submit(event_session(), &form(), &UtmParams::default())
            .await;
        assert_matches!(&session.phase, Phase::Error(f) => {
            assert_eq!(f.kind, FailureKind::Timeout);
            assert_eq!(f.message, ORDER_TIMED_OUT);
        });
    }

    struct QuickOrderSlowVerify;

    #[async_trait]
    impl CheckoutBackend for QuickOrderSlowVerify {
        async fn create_order(
            &self,
            _request: &CreateOrderRequest,
        ) -> Result<CreateOrderResponse, BackendError> {
            Ok(order("order_1", 1770))
        }

        async fn verify_payment(&self, request: &VerifyPaymentRequest) -> Result<bool, BackendError> {
            StalledBackend.verify_payment(request).await
        }

        async fn register(&self, _request: &RegisterRequest) -> Result<Uuid, BackendError> {
            unreachable!("registration must not run after a timeout")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn verify_timeout_keeps_payment_id() {
        let mut widget = MockPaymentWidget::new();
        widget.expect_open().returning(|_, _| completed("order_1", "pay_9"));

        let controller = controller(QuickOrderSlowVerify, widget, loaded_script());
        let session = controller
            .submit(event_session(), &form(), &UtmParams::default())
            .await;
        assert_matches!(&session.phase, Phase::Error(f) => {
            assert_eq!(f.kind, FailureKind::Timeout);
            assert!(f.message.contains("pay_9"));
            assert!(!f.retryable);
        });
    }

    #[tokio::test]
    async fn script_failure_is_retryable() {
        let mut script = MockScriptLoader::new();
        let mut seq = mockall::Sequence::new();
        script.expect_is_loaded().return_const(false);
        script
            .expect_load()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(ScriptError::Status(503)));
        script
            .expect_load()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let controller = controller(MockCheckoutBackend::new(), MockPaymentWidget::new(), script)
            .with_observer(tx);

        let plan = find_plan("chapter-meeting").unwrap();
        let session = CheckoutSession::new(CheckoutContext::for_plan(plan));
        let session = controller.load_payment_script(session).await;
        assert_matches!(&session.phase, Phase::Error(f) => {
            assert_eq!(f.kind, FailureKind::ScriptLoad);
            assert!(f.retryable);
        });
        assert!(!session.toast.as_ref().unwrap().auto_dismiss);

        let session = controller.retry_script_load(session).await;
        assert_eq!(session.phase, Phase::Ready);
        assert!(session.toast.is_none());

        let mut seen = Vec::new();
        while let Ok(kind) = rx.try_recv() {
            seen.push(kind);
        }
        assert_eq!(
            seen,
            vec![
                PhaseKind::ScriptLoading,
                PhaseKind::Error,
                PhaseKind::ScriptLoading,
                PhaseKind::Ready
            ]
        );
    }

    #[test]
    fn coupon_operations_are_pure() {
        let controller = controller(
            MockCheckoutBackend::new(),
            MockPaymentWidget::new(),
            MockScriptLoader::new(),
        );
        let session = controller.apply_coupon(membership_session(), INNERCIRCLE);
        assert_eq!(session.amount, 0);
        let session = controller.remove_coupon(session);
        assert_eq!(session.coupon, CouponState::NoCoupon);
        assert_eq!(session.amount, 8259);
    }
}
