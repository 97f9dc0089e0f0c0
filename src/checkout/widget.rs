//! The provider's modal checkout, seen from the controller.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::services::payments::PaymentVerification;

/// Options handed to the widget when it opens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WidgetOrder {
    pub key: String,
    pub order_id: String,
    /// Minor units
    pub amount: i64,
    pub currency: String,
    pub name: String,
    pub description: String,
    pub theme_color: String,
    pub notes: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Prefill {
    pub name: String,
    pub email: String,
    pub contact: String,
}

/// How the widget closed. Exactly one per `open`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WidgetOutcome {
    Completed(PaymentVerification),
    Dismissed,
    /// Provider-reported failure; the description is already user-readable.
    Failed { description: String },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentWidget: Send + Sync {
    async fn open(&self, order: &WidgetOrder, prefill: &Prefill) -> WidgetOutcome;
}

/// A request for the UI layer to show the widget and report back once.
#[derive(Debug)]
pub struct WidgetRequest {
    pub order: WidgetOrder,
    pub prefill: Prefill,
    pub respond: oneshot::Sender<WidgetOutcome>,
}

/// Bridges callback-style widget events to a single awaited outcome.
#[derive(Clone, Debug)]
pub struct ChannelPaymentWidget {
    requests: mpsc::Sender<WidgetRequest>,
}

impl ChannelPaymentWidget {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<WidgetRequest>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { requests: tx }, rx)
    }
}

#[async_trait]
impl PaymentWidget for ChannelPaymentWidget {
    async fn open(&self, order: &WidgetOrder, prefill: &Prefill) -> WidgetOutcome {
        let (respond, outcome) = oneshot::channel();
        let request = WidgetRequest {
            order: order.clone(),
            prefill: prefill.clone(),
            respond,
        };
        if self.requests.send(request).await.is_err() {
            warn!(order_id = %order.order_id, "no widget driver attached");
            return WidgetOutcome::Failed {
                description: "Payment window could not be opened".into(),
            };
        }
        // A driver that drops the responder closed the window without a result.
        outcome.await.unwrap_or(WidgetOutcome::Dismissed)
    }
}
