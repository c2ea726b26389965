use std::sync::Arc;

use serde_json::Value;
use shared::{
    domain::{ProductId, ScreenRole},
    protocol::ProductRecord,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::{
    arena::ScreenSessionId,
    error::ClientError,
    lifecycle::LifecycleToken,
    notifier::SiblingNotifier,
    transport::{decode_record, ApiRequest, StoreTransport},
    ClientEvent,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductDetailState {
    pub product: Option<ProductRecord>,
    pub loading: bool,
    pub error: Option<ClientError>,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProductOutcome {
    Loaded,
    Deleted { products_list_notified: bool },
    Failed(ClientError),
    Skipped,
    Detached,
}

pub struct ProductDetailController {
    transport: Arc<dyn StoreTransport>,
    notifier: Arc<SiblingNotifier>,
    session: ScreenSessionId,
    token: LifecycleToken,
    events: broadcast::Sender<ClientEvent>,
    product_id: ProductId,
    state: Mutex<ProductDetailState>,
}

impl ProductDetailController {
    pub fn new(
        transport: Arc<dyn StoreTransport>,
        notifier: Arc<SiblingNotifier>,
        session: ScreenSessionId,
        token: LifecycleToken,
        events: broadcast::Sender<ClientEvent>,
        product_id: ProductId,
    ) -> Self {
        Self {
            transport,
            notifier,
            session,
            token,
            events,
            product_id,
            state: Mutex::new(ProductDetailState::default()),
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn session(&self) -> ScreenSessionId {
        self.session
    }

    pub async fn snapshot(&self) -> ProductDetailState {
        self.state.lock().await.clone()
    }

    pub async fn load(&self) -> ProductOutcome {
        if !self.begin().await {
            return ProductOutcome::Skipped;
        }

        let result = match self
            .transport
            .send(ApiRequest::get(format!("products/{}", self.product_id)))
            .await
        {
            Ok(response) => decode_record::<ProductRecord>(response),
            Err(err) => Err(err),
        };

        if !self.token.is_alive() {
            return ProductOutcome::Detached;
        }
        let mut state = self.state.lock().await;
        state.loading = false;
        match result {
            Ok(product) => {
                state.product = Some(product);
                state.error = None;
                ProductOutcome::Loaded
            }
            Err(err) => {
                warn!(product_id = %self.product_id, error = %err, "product fetch failed");
                state.error = Some(err.clone());
                self.emit_notice(err.user_message());
                ProductOutcome::Failed(err)
            }
        }
    }

    /// Deletes the product. A reply echoing the product `id` counts as
    /// success and refreshes the products list.
    pub async fn delete(&self) -> ProductOutcome {
        if !self.begin().await {
            return ProductOutcome::Skipped;
        }

        let result = self
            .transport
            .send(ApiRequest::delete(format!("products/{}", self.product_id)))
            .await
            .and_then(|response| {
                let body: Value = decode_record(response)?;
                if body.get("id").is_some() {
                    Ok(())
                } else {
                    Err(ClientError::Decode(
                        "delete reply did not echo the product id".to_string(),
                    ))
                }
            });

        match result {
            Ok(()) => {
                info!(product_id = %self.product_id, "product deleted");
                let _ = self.events.send(ClientEvent::ProductDeleted {
                    session: self.session,
                    product_id: self.product_id,
                });
                let products_list_notified = self.notifier.notify(ScreenRole::ProductsList).await;
                if self.token.is_alive() {
                    let mut state = self.state.lock().await;
                    state.loading = false;
                    state.deleted = true;
                    state.error = None;
                }
                ProductOutcome::Deleted {
                    products_list_notified,
                }
            }
            Err(err) => {
                warn!(product_id = %self.product_id, error = %err, "product delete failed");
                if !self.token.is_alive() {
                    return ProductOutcome::Detached;
                }
                let mut state = self.state.lock().await;
                state.loading = false;
                state.error = Some(err.clone());
                self.emit_notice(err.user_message());
                ProductOutcome::Failed(err)
            }
        }
    }

    async fn begin(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.loading || state.deleted {
            return false;
        }
        state.loading = true;
        true
    }

    fn emit_notice(&self, message: String) {
        let _ = self.events.send(ClientEvent::Notice {
            session: self.session,
            message,
        });
    }
}

#[cfg(test)]
#[path = "tests/product_tests.rs"]
mod tests;
