//! Drives the headless checkout controller against the real routes served
//! on a local port, with the payment window played by a signing fake.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{TestApp, KEY_SECRET};
use membership_checkout::{
    checkout::{
        utm_from_query, CheckoutConfig, CheckoutContext, CheckoutController, CheckoutForm,
        CheckoutSession, FailureKind, HttpCheckoutBackend, HttpScriptLoader, PaymentWidget,
        Phase, Prefill, WidgetOrder, WidgetOutcome,
    },
    models::find_plan,
    services::{
        coupons::StaticCouponRegistry,
        payments::{sign_payment, PaymentVerification},
    },
};
use wiremock::{
    matchers::{method, path},
    Mock, ResponseTemplate,
};

/// Completes every payment, signing with `secret`, and remembers the orders it saw.
struct SigningWidget {
    secret: String,
    opened: Mutex<Vec<WidgetOrder>>,
}

impl SigningWidget {
    fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
            opened: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PaymentWidget for SigningWidget {
    async fn open(&self, order: &WidgetOrder, _prefill: &Prefill) -> WidgetOutcome {
        self.opened.lock().unwrap().push(order.clone());
        let payment_id = "pay_e2e_1";
        WidgetOutcome::Completed(PaymentVerification {
            order_id: order.order_id.clone(),
            payment_id: payment_id.to_string(),
            signature: sign_payment(&self.secret, &order.order_id, payment_id).unwrap_or_default(),
        })
    }
}

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

async fn controller(app: &TestApp, widget: Arc<SigningWidget>) -> CheckoutController {
    Mock::given(method("GET"))
        .and(path("/v1/checkout.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("/* checkout */"))
        .mount(&app.razorpay)
        .await;

    let base_url = app.serve().await;
    CheckoutController::new(
        Arc::new(HttpCheckoutBackend::new(base_url, Duration::from_secs(30)).unwrap()),
        widget,
        Arc::new(HttpScriptLoader::new(
            format!("{}/v1/checkout.js", app.razorpay.uri()),
            Duration::from_secs(30),
        )),
        Arc::new(StaticCouponRegistry::default()),
        CheckoutConfig::default(),
    )
}

#[tokio::test]
async fn paid_event_checkout_records_registration() {
    let app = TestApp::new().await;
    app.accept_orders("order_e2e_1", 177_000).await;
    let widget = Arc::new(SigningWidget::new(KEY_SECRET));
    let controller = controller(&app, widget.clone()).await;

    let plan = find_plan("chapter-meeting").unwrap();
    let session = CheckoutSession::new(CheckoutContext::for_plan(plan));
    let session = controller.load_payment_script(session).await;
    assert_eq!(session.phase, Phase::Ready);

    let utm = utm_from_query("?utm_source=newsletter&utm_medium=email");
    let session = controller.submit(session, &form(), &utm).await;

    let redirect = match &session.phase {
        Phase::Success { redirect } => redirect.clone(),
        other => panic!("expected success, got {:?}", other),
    };
    assert!(redirect.starts_with("/success?payment_id=pay_e2e_1&"));
    assert!(redirect.contains("amount=1770"));

    let opened = widget.opened.lock().unwrap().clone();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].amount, 177_000);
    assert_eq!(opened[0].key, common::KEY_ID);
}

#[tokio::test]
async fn wrong_signing_secret_stops_before_registration() {
    let app = TestApp::new().await;
    app.accept_orders("order_e2e_2", 177_000).await;
    let controller = controller(&app, Arc::new(SigningWidget::new("not-the-secret"))).await;

    let plan = find_plan("chapter-meeting").unwrap();
    let session = CheckoutSession::new(CheckoutContext::for_plan(plan));
    let session = controller.load_payment_script(session).await;
    let session = controller.submit(session, &form(), &Default::default()).await;

    match &session.phase {
        Phase::Error(failure) => {
            assert_eq!(failure.kind, FailureKind::Verification);
            assert_eq!(failure.payment_id.as_deref(), Some("pay_e2e_1"));
        }
        other => panic!("expected verification failure, got {:?}", other),
    }
    assert!(app.sender.sent().is_empty());
}

#[tokio::test]
async fn coupon_checkout_then_duplicate_is_refused() {
    let app = TestApp::new().await;
    let controller = controller(&app, Arc::new(SigningWidget::new(KEY_SECRET))).await;
    let plan = find_plan("inner-circle").unwrap();

    let session = CheckoutSession::new(CheckoutContext::for_plan(plan));
    let session = controller.apply_coupon(session, "INNERCIRCLE");
    let session = controller.submit(session, &form(), &Default::default()).await;
    match &session.phase {
        Phase::Success { redirect } => {
            assert!(redirect.contains("registration_id="));
            assert!(redirect.contains("coupon=INNERCIRCLE"));
        }
        other => panic!("expected success, got {:?}", other),
    }

    let again = CheckoutSession::new(CheckoutContext::for_plan(plan));
    let again = controller.apply_coupon(again, "INNERCIRCLE");
    let again = controller.submit(again, &form(), &Default::default()).await;
    match &again.phase {
        Phase::Error(failure) => assert_eq!(failure.kind, FailureKind::DuplicateCoupon),
        other => panic!("expected duplicate coupon failure, got {:?}", other),
    }
}
