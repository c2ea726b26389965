use std::{collections::HashMap, sync::Arc};

use futures::{stream::FuturesUnordered, StreamExt};
use serde::Serialize;
use shared::{
    domain::{ApiGeneration, LineItemId, OrderId, ProductId},
    protocol::{LineItem, OrderRecord, ProductRecord, StatusVocabulary},
};
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::{
    arena::ScreenSessionId,
    error::ClientError,
    lifecycle::LifecycleToken,
    status::fetch_status_vocabulary,
    transport::{decode_record, ApiRequest, StoreTransport},
    ClientEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailStage {
    Loading,
    OrderFetched,
    StatusReady,
    ImagesEnriching,
    Ready,
    Errored,
}

impl DetailStage {
    pub fn is_renderable(self) -> bool {
        !matches!(self, Self::Loading | Self::Errored)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedLineItem {
    pub item: LineItem,
    /// Decoded product option strings, `"name: value"`.
    pub options: Vec<String>,
    pub primary_image_url: Option<String>,
    pub enrichment_error: Option<ClientError>,
}

impl EnrichedLineItem {
    fn new(item: LineItem, known_image: Option<String>) -> Self {
        Self {
            options: item.display_options(),
            item,
            primary_image_url: known_image,
            enrichment_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderDetailViewModel {
    pub order_id: OrderId,
    pub stage: DetailStage,
    pub order: Option<OrderRecord>,
    /// `None` until the summary arrives, and after it failed.
    pub status_vocabulary: Option<StatusVocabulary>,
    pub status_error: Option<ClientError>,
    /// Value seeded into the status selector.
    pub selected_status: Option<String>,
    pub line_items: Vec<EnrichedLineItem>,
    pub images_pending: usize,
    pub error: Option<ClientError>,
}

impl OrderDetailViewModel {
    fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            stage: DetailStage::Loading,
            order: None,
            status_vocabulary: None,
            status_error: None,
            selected_status: None,
            line_items: Vec::new(),
            images_pending: 0,
            error: None,
        }
    }

    pub fn status_selector_ready(&self) -> bool {
        self.status_vocabulary
            .as_ref()
            .is_some_and(|vocabulary| !vocabulary.is_empty())
    }

    pub fn currency_display(&self) -> Option<&str> {
        self.order.as_ref().map(OrderRecord::currency_display)
    }

    pub fn product_total_display(&self) -> Option<String> {
        self.order.as_ref().map(OrderRecord::product_total_display)
    }

    fn known_images(&self) -> HashMap<LineItemId, String> {
        self.line_items
            .iter()
            .filter_map(|line| {
                line.primary_image_url
                    .clone()
                    .map(|url| (line.item.id, url))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailOutcome {
    Ready { enriched: usize, failed: usize },
    Errored(ClientError),
    Skipped,
    Detached,
    /// A reload started while this run was suspended.
    Superseded,
}

struct DetailInner {
    model: OrderDetailViewModel,
    run: u64,
    running: bool,
}

pub struct OrderDetailAggregator {
    transport: Arc<dyn StoreTransport>,
    generation: ApiGeneration,
    session: ScreenSessionId,
    token: LifecycleToken,
    events: broadcast::Sender<ClientEvent>,
    order_id: OrderId,
    inner: Mutex<DetailInner>,
}

impl OrderDetailAggregator {
    pub fn new(
        transport: Arc<dyn StoreTransport>,
        generation: ApiGeneration,
        session: ScreenSessionId,
        token: LifecycleToken,
        events: broadcast::Sender<ClientEvent>,
        order_id: OrderId,
    ) -> Self {
        Self {
            transport,
            generation,
            session,
            token,
            events,
            order_id,
            inner: Mutex::new(DetailInner {
                model: OrderDetailViewModel::new(order_id),
                run: 0,
                running: false,
            }),
        }
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn session(&self) -> ScreenSessionId {
        self.session
    }

    pub async fn snapshot(&self) -> OrderDetailViewModel {
        self.inner.lock().await.model.clone()
    }

    pub async fn load(&self) -> DetailOutcome {
        if !self.token.is_alive() {
            return DetailOutcome::Detached;
        }
        let run = {
            let mut inner = self.inner.lock().await;
            if inner.running {
                return DetailOutcome::Skipped;
            }
            self.start_run(&mut inner)
        };
        self.run_pipeline(run).await
    }

    /// Restarts the pipeline, superseding any run in progress. Image URLs
    /// already attached to line items that are still present are kept.
    pub async fn reload(&self) -> DetailOutcome {
        if !self.token.is_alive() {
            return DetailOutcome::Detached;
        }
        let run = {
            let mut inner = self.inner.lock().await;
            self.start_run(&mut inner)
        };
        self.run_pipeline(run).await
    }

    pub async fn select_status(&self, code: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let known = inner
            .model
            .status_vocabulary
            .as_ref()
            .is_some_and(|vocabulary| vocabulary.contains(code));
        if known {
            inner.model.selected_status = Some(code.to_string());
        }
        known
    }

    pub async fn adopt_status(&self, status: &str) {
        if !self.token.is_alive() {
            debug!(order_id = %self.order_id, "detail screen unmounted; dropping status");
            return;
        }
        let mut inner = self.inner.lock().await;
        if let Some(order) = inner.model.order.as_mut() {
            order.status = status.to_string();
        }
        inner.model.selected_status = Some(status.to_string());
    }

    fn start_run(&self, inner: &mut DetailInner) -> u64 {
        inner.run += 1;
        inner.running = true;
        inner.model.stage = DetailStage::Loading;
        inner.model.error = None;
        self.emit_stage(DetailStage::Loading);
        inner.run
    }

    /// Lock the state for a commit, unless the screen is gone or a newer run
    /// took over.
    async fn commit_guard(&self, run: u64) -> Result<MutexGuard<'_, DetailInner>, DetailOutcome> {
        if !self.token.is_alive() {
            debug!(order_id = %self.order_id, "detail screen unmounted; dropping result");
            return Err(DetailOutcome::Detached);
        }
        let inner = self.inner.lock().await;
        if inner.run != run {
            debug!(order_id = %self.order_id, run, "detail run superseded");
            return Err(DetailOutcome::Superseded);
        }
        Ok(inner)
    }

    async fn run_pipeline(&self, run: u64) -> DetailOutcome {
        match self.run_stages(run).await {
            Ok(outcome) | Err(outcome) => outcome,
        }
    }

    async fn run_stages(&self, run: u64) -> Result<DetailOutcome, DetailOutcome> {
        // Stage 1: order record. Any failure halts the pipeline.
        let fetched = match self
            .transport
            .send(ApiRequest::get(format!("orders/{}", self.order_id)))
            .await
        {
            Ok(response) => decode_record::<OrderRecord>(response),
            Err(err) => Err(err),
        };

        let products = {
            let mut inner = self.commit_guard(run).await?;
            let order = match fetched {
                Ok(order) => order,
                Err(err) => {
                    warn!(order_id = %self.order_id, error = %err, "order fetch failed");
                    inner.model.stage = DetailStage::Errored;
                    inner.model.error = Some(err.clone());
                    inner.running = false;
                    self.emit_stage(DetailStage::Errored);
                    self.emit_notice(err.user_message());
                    return Ok(DetailOutcome::Errored(err));
                }
            };

            let known = inner.model.known_images();
            inner.model.line_items = order
                .line_items
                .iter()
                .cloned()
                .map(|item| {
                    let image = known.get(&item.id).cloned();
                    EnrichedLineItem::new(item, image)
                })
                .collect();
            inner.model.selected_status = Some(order.status.clone());
            inner.model.order = Some(order);
            inner.model.stage = DetailStage::OrderFetched;
            self.emit_stage(DetailStage::OrderFetched);

            inner
                .model
                .line_items
                .iter()
                .map(|line| (line.item.id, line.item.product_id))
                .collect::<Vec<_>>()
        };

        // Stage 2: status vocabulary. Failure leaves the selector empty.
        let vocabulary = fetch_status_vocabulary(self.transport.as_ref(), self.generation).await;
        {
            let mut inner = self.commit_guard(run).await?;
            match vocabulary {
                Ok(vocabulary) => {
                    inner.model.status_vocabulary = Some(vocabulary);
                    inner.model.status_error = None;
                }
                Err(err) => {
                    warn!(order_id = %self.order_id, error = %err, "status vocabulary unavailable");
                    inner.model.status_vocabulary = None;
                    inner.model.status_error = Some(err.clone());
                    self.emit_notice(err.user_message());
                }
            }
            inner.model.stage = DetailStage::StatusReady;
            self.emit_stage(DetailStage::StatusReady);

            inner.model.images_pending = products.len();
            inner.model.stage = DetailStage::ImagesEnriching;
            self.emit_stage(DetailStage::ImagesEnriching);
        }

        // Stage 3: per line item image lookups, committed by index as they land.
        let transport = self.transport.as_ref();
        let mut lookups = products
            .into_iter()
            .enumerate()
            .map(|(index, (line_item_id, product_id))| async move {
                let result = fetch_primary_image(transport, product_id).await;
                (index, line_item_id, result)
            })
            .collect::<FuturesUnordered<_>>();

        let mut enriched = 0;
        let mut failed = 0;
        while let Some((index, line_item_id, result)) = lookups.next().await {
            let mut inner = self.commit_guard(run).await?;
            inner.model.images_pending = inner.model.images_pending.saturating_sub(1);

            let Some(line) = inner
                .model
                .line_items
                .get_mut(index)
                .filter(|line| line.item.id == line_item_id)
            else {
                continue;
            };

            match result {
                Ok(Some(url)) => {
                    line.primary_image_url = Some(url);
                    line.enrichment_error = None;
                    enriched += 1;
                }
                Ok(None) => {}
                Err(err) => {
                    debug!(
                        order_id = %self.order_id,
                        line_item = %line_item_id,
                        error = %err,
                        "line item image lookup failed"
                    );
                    line.enrichment_error = Some(err);
                    failed += 1;
                }
            }
            let _ = self.events.send(ClientEvent::LineItemEnriched {
                session: self.session,
                index,
                line_item_id,
                image_url: line.primary_image_url.clone(),
            });
        }

        let mut inner = self.commit_guard(run).await?;
        inner.model.stage = DetailStage::Ready;
        inner.running = false;
        info!(order_id = %self.order_id, enriched, failed, "order detail ready");
        let _ = self.events.send(ClientEvent::ImagesSettled {
            session: self.session,
            enriched,
            failed,
        });
        self.emit_stage(DetailStage::Ready);
        Ok(DetailOutcome::Ready { enriched, failed })
    }

    fn emit_stage(&self, stage: DetailStage) {
        let _ = self.events.send(ClientEvent::DetailStageChanged {
            session: self.session,
            order_id: self.order_id,
            stage,
        });
    }

    fn emit_notice(&self, message: String) {
        let _ = self.events.send(ClientEvent::Notice {
            session: self.session,
            message,
        });
    }
}

async fn fetch_primary_image(
    transport: &dyn StoreTransport,
    product_id: ProductId,
) -> Result<Option<String>, ClientError> {
    let response = transport
        .send(ApiRequest::get(format!("products/{product_id}")))
        .await?;
    let product: ProductRecord = decode_record(response)?;
    Ok(product.primary_image_url().map(str::to_string))
}

#[cfg(test)]
#[path = "tests/detail_tests.rs"]
mod tests;
