use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use membership_checkout::{
    build_router,
    config::AppConfig,
    db,
    notifications::{
        Destination, MessageSender, NotificationDispatcher, NotificationError,
        NotificationGateway, NotificationOutcome, SendReceipt,
    },
    services::payments::{PaymentGateway, RazorpayClient, RazorpayConfig},
    AppState,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;
use wiremock::{
    matchers::{basic_auth, method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const KEY_ID: &str = "rzp_test_key";
pub const KEY_SECRET: &str = "rzp_test_secret";

/// Records every message instead of calling a provider.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(Destination, String)>>,
}

impl RecordingSender {
    #[allow(dead_code)]
    pub fn sent(&self) -> Vec<(Destination, String)> {
        self.sent.lock().expect("sender lock").clone()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn deliver(
        &self,
        destination: &Destination,
        body: &str,
    ) -> Result<SendReceipt, NotificationError> {
        let mut sent = self.sent.lock().expect("sender lock");
        sent.push((destination.clone(), body.to_string()));
        Ok(SendReceipt {
            sid: format!("SM{:032}", sent.len()),
            status: "queued".into(),
        })
    }
}

/// Application state over in-memory SQLite, a mocked Razorpay API and a
/// recording message sender.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub razorpay: MockServer,
    pub sender: Arc<RecordingSender>,
    pub outcomes: mpsc::UnboundedReceiver<NotificationOutcome>,
    _worker: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let razorpay = MockServer::start().await;

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // One connection so every query sees the same in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.razorpay_key_id = KEY_ID.to_string();
        cfg.razorpay_key_secret = KEY_SECRET.to_string();
        cfg.razorpay_api_base = razorpay.uri();
        customize(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let payments: Arc<dyn PaymentGateway> =
            Arc::new(RazorpayClient::new(RazorpayConfig::from(&cfg)));
        let sender = Arc::new(RecordingSender::default());
        let (dispatcher, outcomes, worker) = NotificationDispatcher::spawn_observed(
            NotificationGateway::new(sender.clone(), &cfg.default_country_code),
            16,
        );

        let state = AppState::assemble(
            Arc::new(pool),
            Arc::new(cfg),
            payments,
            sender.clone(),
            dispatcher,
        );

        Self {
            router: build_router(state.clone()),
            state,
            razorpay,
            sender,
            outcomes,
            _worker: worker,
        }
    }

    /// Makes the mocked provider accept any order and echo the amount back.
    #[allow(dead_code)]
    pub async fn accept_orders(&self, order_id: &str, amount_minor: i64) {
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .and(basic_auth(KEY_ID, KEY_SECRET))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": order_id,
                "entity": "order",
                "amount": amount_minor,
                "currency": "INR",
                "status": "created"
            })))
            .mount(&self.razorpay)
            .await;
    }

    #[allow(dead_code)]
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request_with_headers(method, uri, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Serves the router on an ephemeral port and returns its base URL.
    #[allow(dead_code)]
    pub async fn serve(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let router = self.router.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{}", addr)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._worker.abort();
    }
}

#[allow(dead_code)]
pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

#[allow(dead_code)]
pub fn registration_body(phone: &str, coupon: Option<&str>, amount: i64) -> Value {
    json!({
        "name": "Asha Rao",
        "email": "asha@x.com",
        "phone": phone,
        "businessName": "Acme",
        "amount": amount,
        "paidFor": "Inner Circle Membership",
        "isEvent": false,
        "couponCode": coupon,
        "utm_source": "newsletter",
        "utm_campaign": "launch"
    })
}
