use std::sync::Arc;

use serde_json::{json, Value};
use shared::{domain::ScreenRole, error::ApiError, protocol::StatusUpdateRequest};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    arena::ScreenSessionId,
    detail::{DetailOutcome, OrderDetailAggregator},
    notifier::SiblingNotifier,
    transport::{ApiRequest, StoreTransport},
    ClientEvent,
};

/// How the store answered a status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The status the server reports after the update. It may differ from
    /// the one requested.
    Applied(String),
    Rejected(String),
    Unknown,
}

impl MutationOutcome {
    /// An error envelope wins over a `status` field; a reply with neither is
    /// `Unknown`.
    pub fn from_reply(body: &Value) -> Self {
        if let Some(error) = ApiError::from_body(body) {
            let message = if error.message.is_empty() {
                error.code
            } else {
                error.message
            };
            return Self::Rejected(message);
        }
        match body.get("status").and_then(Value::as_str) {
            Some(status) => Self::Applied(status.to_string()),
            None => Self::Unknown,
        }
    }

    pub fn notice(&self) -> String {
        match self {
            Self::Applied(status) => format!("Order status changed to {status}"),
            Self::Rejected(message) => message.clone(),
            Self::Unknown => "Unable to change the order status".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationReport {
    pub outcome: MutationOutcome,
    pub reload: DetailOutcome,
    pub orders_list_notified: bool,
}

/// Applies status changes to the order shown by one detail screen.
pub struct StatusMutator {
    transport: Arc<dyn StoreTransport>,
    detail: Arc<OrderDetailAggregator>,
    notifier: Arc<SiblingNotifier>,
    events: broadcast::Sender<ClientEvent>,
}

impl StatusMutator {
    pub fn new(
        transport: Arc<dyn StoreTransport>,
        detail: Arc<OrderDetailAggregator>,
        notifier: Arc<SiblingNotifier>,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            transport,
            detail,
            notifier,
            events,
        }
    }

    pub fn session(&self) -> ScreenSessionId {
        self.detail.session()
    }

    /// Sends the change, then always re-fetches the order once and asks the
    /// orders list to refresh once, whatever the outcome.
    pub async fn apply_status(&self, code: &str) -> MutationReport {
        let order_id = self.detail.order_id();
        let body = serde_json::to_value(StatusUpdateRequest {
            status: code.to_string(),
        })
        .unwrap_or_else(|_| json!({ "status": code }));

        let outcome = match self
            .transport
            .send(ApiRequest::put(format!("orders/{order_id}"), body))
            .await
        {
            Ok(response) => MutationOutcome::from_reply(&response.body),
            Err(err) => {
                warn!(%order_id, error = %err, "status update request failed");
                MutationOutcome::Unknown
            }
        };

        match &outcome {
            MutationOutcome::Applied(status) => {
                info!(%order_id, requested = code, applied = %status, "order status updated");
                self.detail.adopt_status(status).await;
            }
            MutationOutcome::Rejected(message) => {
                warn!(%order_id, requested = code, %message, "status update rejected");
            }
            MutationOutcome::Unknown => {
                warn!(%order_id, requested = code, "status update outcome unknown");
            }
        }

        let _ = self.events.send(ClientEvent::StatusMutation {
            session: self.session(),
            order_id,
            outcome: outcome.clone(),
        });
        let _ = self.events.send(ClientEvent::Notice {
            session: self.session(),
            message: outcome.notice(),
        });

        let reload = self.detail.reload().await;
        let orders_list_notified = self.notifier.notify(ScreenRole::OrdersList).await;

        MutationReport {
            outcome,
            reload,
            orders_list_notified,
        }
    }

    /// Applies the status currently chosen in the detail screen's selector.
    pub async fn apply_selected(&self) -> Option<MutationReport> {
        let selected = self.detail.snapshot().await.selected_status?;
        Some(self.apply_status(&selected).await)
    }
}

#[cfg(test)]
#[path = "tests/mutation_tests.rs"]
mod tests;
