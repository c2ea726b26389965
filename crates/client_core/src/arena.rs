use std::{collections::HashMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use shared::{
    domain::ScreenRole,
    protocol::{OrderRecord, ProductRecord, ReviewRecord},
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    detail::OrderDetailAggregator, lifecycle::ScreenLifecycle, mutation::StatusMutator,
    paged_list::PagedListController, product::ProductDetailController, reports::ReportsDashboard,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenSessionId(pub Uuid);

impl ScreenSessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScreenSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScreenSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order detail screen: the pipeline plus the mutator bound to it.
#[derive(Clone)]
pub struct OrderDetailScreen {
    pub detail: Arc<OrderDetailAggregator>,
    pub mutator: Arc<StatusMutator>,
}

#[derive(Clone)]
pub enum ScreenHandle {
    OrdersList(Arc<PagedListController<OrderRecord>>),
    ProductsList(Arc<PagedListController<ProductRecord>>),
    ReviewsList(Arc<PagedListController<ReviewRecord>>),
    OrderDetail(OrderDetailScreen),
    ProductDetail(Arc<ProductDetailController>),
    Reports(Arc<ReportsDashboard>),
}

impl ScreenHandle {
    /// Role under which the screen is reachable through the notifier.
    pub fn role(&self) -> Option<ScreenRole> {
        match self {
            Self::OrdersList(_) => Some(ScreenRole::OrdersList),
            Self::ProductsList(_) => Some(ScreenRole::ProductsList),
            Self::ReviewsList(_) => Some(ScreenRole::ReviewsList),
            Self::OrderDetail(_) | Self::ProductDetail(_) | Self::Reports(_) => None,
        }
    }
}

pub(crate) struct MountedScreen {
    pub(crate) handle: ScreenHandle,
    pub(crate) lifecycle: ScreenLifecycle,
}

/// Mounted screens of one session, each owning its own view model.
#[derive(Default)]
pub struct ScreenArena {
    screens: Mutex<HashMap<ScreenSessionId, MountedScreen>>,
}

impl ScreenArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn insert(
        &self,
        id: ScreenSessionId,
        handle: ScreenHandle,
        lifecycle: ScreenLifecycle,
    ) {
        self.screens
            .lock()
            .await
            .insert(id, MountedScreen { handle, lifecycle });
    }

    pub(crate) async fn remove(&self, id: ScreenSessionId) -> Option<MountedScreen> {
        self.screens.lock().await.remove(&id)
    }

    pub async fn get(&self, id: ScreenSessionId) -> Option<ScreenHandle> {
        self.screens
            .lock()
            .await
            .get(&id)
            .map(|screen| screen.handle.clone())
    }

    pub async fn contains(&self, id: ScreenSessionId) -> bool {
        self.screens.lock().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.screens.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.screens.lock().await.is_empty()
    }
}
