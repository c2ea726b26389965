use std::sync::Arc;

use shared::{
    domain::{LineItemId, OrderId, ProductId, Resource, ScreenRole},
    protocol::{OrderRecord, ProductRecord, ReviewRecord, StatusVocabulary},
};
use tokio::sync::broadcast;
use tracing::info;

pub mod arena;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod detail;
pub mod error;
pub mod lifecycle;
pub mod mutation;
pub mod notifier;
pub mod paged_list;
pub mod product;
pub mod reports;
pub mod status;
#[cfg(test)]
pub(crate) mod testing;
pub mod transport;

pub use arena::{OrderDetailScreen, ScreenArena, ScreenHandle, ScreenSessionId};
pub use config::{load_settings, Settings};
pub use credentials::{
    CredentialProvider, Credentials, MemorySecureStore, SecureStore, StoredCredentialProvider,
};
pub use detail::{DetailOutcome, DetailStage, OrderDetailAggregator, OrderDetailViewModel};
pub use error::ClientError;
pub use mutation::{MutationOutcome, MutationReport, StatusMutator};
pub use notifier::{RefreshTarget, SiblingNotifier};
pub use paged_list::{ListQuery, ListRecord, ListState, LoadOutcome, PagedListController};
pub use product::{ProductDetailController, ProductDetailState, ProductOutcome};
pub use reports::{ReportKind, ReportSlot, ReportsDashboard, ReportsSnapshot};
pub use transport::{HttpTransport, StoreTransport};

use lifecycle::ScreenLifecycle;

#[derive(Debug, Clone)]
pub enum ClientEvent {
    ListUpdated {
        session: ScreenSessionId,
        resource: Resource,
        items: usize,
        has_more: bool,
    },
    DetailStageChanged {
        session: ScreenSessionId,
        order_id: OrderId,
        stage: DetailStage,
    },
    LineItemEnriched {
        session: ScreenSessionId,
        index: usize,
        line_item_id: LineItemId,
        image_url: Option<String>,
    },
    /// Every image lookup of a detail run has reported back.
    ImagesSettled {
        session: ScreenSessionId,
        enriched: usize,
        failed: usize,
    },
    StatusMutation {
        session: ScreenSessionId,
        order_id: OrderId,
        outcome: MutationOutcome,
    },
    ProductDeleted {
        session: ScreenSessionId,
        product_id: ProductId,
    },
    ReportUpdated {
        session: ScreenSessionId,
        kind: ReportKind,
        ready: bool,
    },
    /// Transient user-facing message.
    Notice {
        session: ScreenSessionId,
        message: String,
    },
}

/// One signed-in session against a store: owns the transport, the sibling
/// notifier, the mounted screens and the event bus.
pub struct StorefrontClient {
    transport: Arc<dyn StoreTransport>,
    settings: Settings,
    notifier: Arc<SiblingNotifier>,
    arena: ScreenArena,
    events: broadcast::Sender<ClientEvent>,
}

impl StorefrontClient {
    /// Loads credentials once and binds an HTTP transport to them.
    pub async fn connect(
        provider: &dyn CredentialProvider,
        settings: Settings,
    ) -> Result<Arc<Self>, ClientError> {
        let credentials = provider.load_credentials().await?;
        let transport = HttpTransport::new(credentials, &settings)?;
        info!(api_root = transport.api_root(), "storefront session started");
        Ok(Self::with_transport(Arc::new(transport), settings))
    }

    pub fn with_transport(transport: Arc<dyn StoreTransport>, settings: Settings) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            transport,
            settings,
            notifier: SiblingNotifier::new(),
            arena: ScreenArena::new(),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn notifier(&self) -> Arc<SiblingNotifier> {
        Arc::clone(&self.notifier)
    }

    pub fn arena(&self) -> &ScreenArena {
        &self.arena
    }

    pub async fn mount_orders_list(&self) -> Arc<PagedListController<OrderRecord>> {
        self.mount_list(ScreenHandle::OrdersList).await
    }

    pub async fn mount_products_list(&self) -> Arc<PagedListController<ProductRecord>> {
        self.mount_list(ScreenHandle::ProductsList).await
    }

    pub async fn mount_reviews_list(&self) -> Arc<PagedListController<ReviewRecord>> {
        self.mount_list(ScreenHandle::ReviewsList).await
    }

    async fn mount_list<T: ListRecord>(
        &self,
        wrap: fn(Arc<PagedListController<T>>) -> ScreenHandle,
    ) -> Arc<PagedListController<T>> {
        let id = ScreenSessionId::new();
        let lifecycle = ScreenLifecycle::new();
        let controller = Arc::new(PagedListController::new(
            Arc::clone(&self.transport),
            id,
            lifecycle.token(),
            self.events.clone(),
            self.settings.initial_list_delay(),
        ));
        let role = ScreenRole::for_resource(T::RESOURCE);
        self.notifier.register(role, &controller).await;
        self.arena
            .insert(id, wrap(Arc::clone(&controller)), lifecycle)
            .await;
        info!(session = %id, resource = %T::RESOURCE, "list screen mounted");
        controller
    }

    pub async fn mount_order_detail(&self, order_id: OrderId) -> OrderDetailScreen {
        let id = ScreenSessionId::new();
        let lifecycle = ScreenLifecycle::new();
        let detail = Arc::new(OrderDetailAggregator::new(
            Arc::clone(&self.transport),
            self.settings.api_generation,
            id,
            lifecycle.token(),
            self.events.clone(),
            order_id,
        ));
        let mutator = Arc::new(StatusMutator::new(
            Arc::clone(&self.transport),
            Arc::clone(&detail),
            Arc::clone(&self.notifier),
            self.events.clone(),
        ));
        let screen = OrderDetailScreen { detail, mutator };
        self.arena
            .insert(id, ScreenHandle::OrderDetail(screen.clone()), lifecycle)
            .await;
        info!(session = %id, %order_id, "order detail screen mounted");
        screen
    }

    pub async fn mount_product_detail(&self, product_id: ProductId) -> Arc<ProductDetailController> {
        let id = ScreenSessionId::new();
        let lifecycle = ScreenLifecycle::new();
        let controller = Arc::new(ProductDetailController::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.notifier),
            id,
            lifecycle.token(),
            self.events.clone(),
            product_id,
        ));
        self.arena
            .insert(id, ScreenHandle::ProductDetail(Arc::clone(&controller)), lifecycle)
            .await;
        controller
    }

    pub async fn mount_reports(&self) -> Arc<ReportsDashboard> {
        let id = ScreenSessionId::new();
        let lifecycle = ScreenLifecycle::new();
        let dashboard = Arc::new(ReportsDashboard::new(
            Arc::clone(&self.transport),
            id,
            lifecycle.token(),
            self.events.clone(),
            self.settings.reports_products_enabled,
            self.settings.reports_reviews_enabled,
        ));
        self.arena
            .insert(id, ScreenHandle::Reports(Arc::clone(&dashboard)), lifecycle)
            .await;
        dashboard
    }

    /// Ends the screen's lifecycle so in-flight results are dropped, and
    /// removes it from the notifier if it is the registered instance.
    pub async fn unmount(&self, id: ScreenSessionId) -> bool {
        let Some(screen) = self.arena.remove(id).await else {
            return false;
        };
        screen.lifecycle.end();
        match &screen.handle {
            ScreenHandle::OrdersList(list) => {
                self.notifier
                    .unregister_instance(ScreenRole::OrdersList, list)
                    .await
            }
            ScreenHandle::ProductsList(list) => {
                self.notifier
                    .unregister_instance(ScreenRole::ProductsList, list)
                    .await
            }
            ScreenHandle::ReviewsList(list) => {
                self.notifier
                    .unregister_instance(ScreenRole::ReviewsList, list)
                    .await
            }
            ScreenHandle::OrderDetail(_)
            | ScreenHandle::ProductDetail(_)
            | ScreenHandle::Reports(_) => {}
        }
        info!(session = %id, "screen unmounted");
        true
    }

    /// Status codes for the orders list filter, led by the "all" sentinel.
    pub async fn order_status_filters(&self) -> Result<StatusVocabulary, ClientError> {
        let vocabulary =
            status::fetch_status_vocabulary(self.transport.as_ref(), self.settings.api_generation)
                .await?;
        Ok(vocabulary.with_all_sentinel())
    }
}

/// Verifies credentials against the store and stores them on success.
pub async fn sign_in(
    store: &dyn SecureStore,
    credentials: Credentials,
    settings: &Settings,
) -> Result<(), ClientError> {
    let transport = HttpTransport::new(credentials.clone(), settings)?;
    credentials::sign_in(
        &transport,
        store,
        &credentials,
        settings.api_generation.sign_in_probe_path(),
    )
    .await
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
