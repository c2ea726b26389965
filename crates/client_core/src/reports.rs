use std::{fmt, sync::Arc};

use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::protocol::{ProductsSummary, ReviewsSummary, SalesSummary};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::{
    arena::ScreenSessionId,
    error::ClientError,
    lifecycle::LifecycleToken,
    transport::{decode_record, ApiRequest, StoreTransport},
    ClientEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Sales,
    Products,
    Reviews,
}

impl ReportKind {
    pub fn path(self) -> &'static str {
        match self {
            Self::Sales => "reports/summary",
            Self::Products => "products/summary",
            Self::Reviews => "reviews/summary",
        }
    }

    /// Key whose presence marks a usable summary.
    pub fn marker_key(self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Products => "post_counts",
            Self::Reviews => "comment_counts",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sales => "sales",
            Self::Products => "products",
            Self::Reviews => "reviews",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportSlot<T> {
    /// The store module behind this report is turned off.
    Disabled,
    Pending,
    Ready(T),
    Unavailable(ClientError),
}

impl<T> ReportSlot<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(report) => Some(report),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportsSnapshot {
    pub sales: ReportSlot<SalesSummary>,
    pub products: ReportSlot<ProductsSummary>,
    pub reviews: ReportSlot<ReviewsSummary>,
}

pub struct ReportsDashboard {
    transport: Arc<dyn StoreTransport>,
    session: ScreenSessionId,
    token: LifecycleToken,
    events: broadcast::Sender<ClientEvent>,
    products_enabled: bool,
    reviews_enabled: bool,
    snapshot: Mutex<ReportsSnapshot>,
}

impl ReportsDashboard {
    pub fn new(
        transport: Arc<dyn StoreTransport>,
        session: ScreenSessionId,
        token: LifecycleToken,
        events: broadcast::Sender<ClientEvent>,
        products_enabled: bool,
        reviews_enabled: bool,
    ) -> Self {
        Self {
            transport,
            session,
            token,
            events,
            products_enabled,
            reviews_enabled,
            snapshot: Mutex::new(ReportsSnapshot {
                sales: ReportSlot::Pending,
                products: initial_slot(products_enabled),
                reviews: initial_slot(reviews_enabled),
            }),
        }
    }

    pub fn session(&self) -> ScreenSessionId {
        self.session
    }

    pub async fn snapshot(&self) -> ReportsSnapshot {
        self.snapshot.lock().await.clone()
    }

    /// Fetches every enabled report concurrently. Each slot is committed as
    /// soon as its own request finishes.
    pub async fn refresh_all(&self) -> ReportsSnapshot {
        {
            let mut snapshot = self.snapshot.lock().await;
            snapshot.sales = ReportSlot::Pending;
            if self.products_enabled {
                snapshot.products = ReportSlot::Pending;
            }
            if self.reviews_enabled {
                snapshot.reviews = ReportSlot::Pending;
            }
        }

        let sales = async {
            let slot = self.fetch::<SalesSummary>(ReportKind::Sales).await;
            self.commit(ReportKind::Sales, slot.is_ready(), |s| s.sales = slot)
                .await;
        };
        let products = async {
            if self.products_enabled {
                let slot = self.fetch::<ProductsSummary>(ReportKind::Products).await;
                self.commit(ReportKind::Products, slot.is_ready(), |s| s.products = slot)
                    .await;
            }
        };
        let reviews = async {
            if self.reviews_enabled {
                let slot = self.fetch::<ReviewsSummary>(ReportKind::Reviews).await;
                self.commit(ReportKind::Reviews, slot.is_ready(), |s| s.reviews = slot)
                    .await;
            }
        };
        futures::join!(sales, products, reviews);

        self.snapshot().await
    }

    async fn fetch<T: DeserializeOwned>(&self, kind: ReportKind) -> ReportSlot<T> {
        match self.fetch_report(kind).await {
            Ok(report) => ReportSlot::Ready(report),
            Err(err) => {
                warn!(report = %kind, error = %err, "report unavailable");
                ReportSlot::Unavailable(err)
            }
        }
    }

    async fn fetch_report<T: DeserializeOwned>(&self, kind: ReportKind) -> Result<T, ClientError> {
        let response = self.transport.send(ApiRequest::get(kind.path())).await?;
        let body: Value = decode_record(response)?;
        if body.get(kind.marker_key()).is_none() {
            return Err(ClientError::Decode(format!(
                "{kind} report is missing '{}'",
                kind.marker_key()
            )));
        }
        Ok(serde_json::from_value(body)?)
    }

    async fn commit(&self, kind: ReportKind, ready: bool, apply: impl FnOnce(&mut ReportsSnapshot)) {
        if !self.token.is_alive() {
            debug!(report = %kind, "reports screen unmounted; dropping report");
            return;
        }
        apply(&mut *self.snapshot.lock().await);
        let _ = self.events.send(ClientEvent::ReportUpdated {
            session: self.session,
            kind,
            ready,
        });
    }
}

fn initial_slot<T>(enabled: bool) -> ReportSlot<T> {
    if enabled {
        ReportSlot::Pending
    } else {
        ReportSlot::Disabled
    }
}

#[cfg(test)]
#[path = "tests/reports_tests.rs"]
mod tests;
