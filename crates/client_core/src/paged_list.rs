use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use shared::{
    domain::Resource,
    protocol::{OrderRecord, ProductRecord, ReviewRecord, ALL_STATUSES, PER_PAGE},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    arena::ScreenSessionId,
    error::ClientError,
    lifecycle::LifecycleToken,
    notifier::RefreshTarget,
    transport::{decode_record, ApiRequest, StoreTransport},
    ClientEvent,
};

pub trait ListRecord: DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    const RESOURCE: Resource;

    fn record_id(&self) -> i64;
}

impl ListRecord for OrderRecord {
    const RESOURCE: Resource = Resource::Orders;

    fn record_id(&self) -> i64 {
        self.id.0
    }
}

impl ListRecord for ProductRecord {
    const RESOURCE: Resource = Resource::Products;

    fn record_id(&self) -> i64 {
        self.id.0
    }
}

impl ListRecord for ReviewRecord {
    const RESOURCE: Resource = Resource::Reviews;

    fn record_id(&self) -> i64 {
        self.id.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub search_term: Option<String>,
    /// Orders only; `None` lists every status.
    pub status: Option<String>,
    pub per_page: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            search_term: None,
            status: None,
            per_page: PER_PAGE,
        }
    }
}

impl ListQuery {
    pub fn to_request(&self, resource: Resource) -> ApiRequest {
        let mut request = ApiRequest::get(resource.path())
            .with_query("per_page", self.per_page)
            .with_query("page", self.page);
        if let Some(term) = self.search_term.as_deref() {
            request = request.with_query("search", term);
        }
        if let Some(status) = self.status.as_deref() {
            request = request.with_query("status", status);
        }
        request
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListState<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    pub loading: bool,
    pub refreshing: bool,
    pub error: Option<ClientError>,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            has_more: true,
            loading: false,
            refreshing: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Appended(usize),
    Exhausted,
    Failed(ClientError),
    /// Another load of the same epoch was already in flight, or there is
    /// nothing more to load.
    Skipped,
    Detached,
    Stale,
}

struct ListInner<T> {
    query: ListQuery,
    state: ListState<T>,
    epoch: u64,
    committed_page: Option<u32>,
    started: bool,
}

struct PageTicket {
    epoch: u64,
    request: ApiRequest,
    first: bool,
}

pub struct PagedListController<T: ListRecord> {
    transport: Arc<dyn StoreTransport>,
    session: ScreenSessionId,
    token: LifecycleToken,
    events: broadcast::Sender<ClientEvent>,
    initial_delay: Duration,
    inner: Mutex<ListInner<T>>,
}

impl<T: ListRecord> PagedListController<T> {
    pub fn new(
        transport: Arc<dyn StoreTransport>,
        session: ScreenSessionId,
        token: LifecycleToken,
        events: broadcast::Sender<ClientEvent>,
        initial_delay: Duration,
    ) -> Self {
        Self {
            transport,
            session,
            token,
            events,
            initial_delay,
            inner: Mutex::new(ListInner {
                query: ListQuery::default(),
                state: ListState::default(),
                epoch: 0,
                committed_page: None,
                started: false,
            }),
        }
    }

    pub fn session(&self) -> ScreenSessionId {
        self.session
    }

    pub fn resource(&self) -> Resource {
        T::RESOURCE
    }

    pub async fn snapshot(&self) -> ListState<T> {
        self.inner.lock().await.state.clone()
    }

    pub async fn query(&self) -> ListQuery {
        self.inner.lock().await.query.clone()
    }

    /// Fetches the current page unless it is already committed. After a
    /// failed page this retries it.
    pub async fn load(&self) -> LoadOutcome {
        let ticket = {
            let mut inner = self.inner.lock().await;
            if inner.state.loading {
                debug!(resource = %T::RESOURCE, "list load already in flight");
                return LoadOutcome::Skipped;
            }
            if inner.committed_page == Some(inner.query.page) {
                return LoadOutcome::Skipped;
            }
            Self::begin(&mut inner)
        };
        self.run(ticket).await
    }

    /// Requests the next page. A no-op once the list is exhausted or while a
    /// page is still loading.
    pub async fn load_more(&self) -> LoadOutcome {
        let ticket = {
            let mut inner = self.inner.lock().await;
            if !inner.state.has_more || inner.state.loading {
                return LoadOutcome::Skipped;
            }
            inner.query.page += 1;
            Self::begin(&mut inner)
        };
        self.run(ticket).await
    }

    pub async fn refresh(&self) -> LoadOutcome {
        self.restart(|_| {}).await
    }

    pub async fn search(&self, term: &str) -> LoadOutcome {
        let term = term.trim();
        let term = (!term.is_empty()).then(|| term.to_string());
        self.restart(move |query| query.search_term = term).await
    }

    /// Restricts the list to one status code; `"all"` or an empty code
    /// removes the filter.
    pub async fn filter_by_status(&self, code: &str) -> LoadOutcome {
        let code = code.trim();
        let status = (!code.is_empty() && code != ALL_STATUSES).then(|| code.to_string());
        self.restart(move |query| query.status = status).await
    }

    async fn restart(&self, adjust: impl FnOnce(&mut ListQuery)) -> LoadOutcome {
        if !self.token.is_alive() {
            return LoadOutcome::Detached;
        }
        let ticket = {
            let mut inner = self.inner.lock().await;
            adjust(&mut inner.query);
            inner.query.page = 1;
            inner.epoch += 1;
            inner.committed_page = None;
            inner.state.items.clear();
            inner.state.has_more = true;
            inner.state.error = None;
            inner.state.refreshing = true;
            Self::begin(&mut inner)
        };
        self.run(ticket).await
    }

    fn begin(inner: &mut ListInner<T>) -> PageTicket {
        inner.state.loading = true;
        let first = !inner.started;
        inner.started = true;
        PageTicket {
            epoch: inner.epoch,
            request: inner.query.to_request(T::RESOURCE),
            first,
        }
    }

    async fn run(&self, ticket: PageTicket) -> LoadOutcome {
        if ticket.first && !self.initial_delay.is_zero() {
            tokio::time::sleep(self.initial_delay).await;
        }

        let result = match self.transport.send(ticket.request).await {
            Ok(response) => decode_record::<Vec<T>>(response),
            Err(err) => Err(err),
        };

        if !self.token.is_alive() {
            debug!(resource = %T::RESOURCE, "list screen unmounted; dropping page");
            return LoadOutcome::Detached;
        }

        let mut inner = self.inner.lock().await;
        if inner.epoch != ticket.epoch {
            debug!(resource = %T::RESOURCE, epoch = ticket.epoch, "discarding page from stale epoch");
            return LoadOutcome::Stale;
        }

        let page = inner.query.page;
        let outcome = match result {
            Ok(records) if records.is_empty() => {
                inner.committed_page = Some(page);
                inner.state.has_more = false;
                LoadOutcome::Exhausted
            }
            Ok(records) => {
                let count = records.len();
                inner.committed_page = Some(page);
                inner.state.items.extend(records);
                inner.state.has_more = true;
                inner.state.error = None;
                LoadOutcome::Appended(count)
            }
            Err(err) => {
                warn!(resource = %T::RESOURCE, page, error = %err, "list page failed");
                inner.state.has_more = false;
                inner.state.error = Some(err.clone());
                let _ = self.events.send(ClientEvent::Notice {
                    session: self.session,
                    message: err.user_message(),
                });
                LoadOutcome::Failed(err)
            }
        };
        inner.state.loading = false;
        inner.state.refreshing = false;

        info!(
            resource = %T::RESOURCE,
            page,
            items = inner.state.items.len(),
            has_more = inner.state.has_more,
            "list page committed"
        );
        let _ = self.events.send(ClientEvent::ListUpdated {
            session: self.session,
            resource: T::RESOURCE,
            items: inner.state.items.len(),
            has_more: inner.state.has_more,
        });
        outcome
    }
}

#[async_trait]
impl<T: ListRecord> RefreshTarget for PagedListController<T> {
    async fn refresh_from_start(&self) {
        let outcome = self.refresh().await;
        debug!(resource = %T::RESOURCE, ?outcome, "sibling-triggered refresh finished");
    }
}

#[cfg(test)]
#[path = "tests/paged_list_tests.rs"]
mod tests;
