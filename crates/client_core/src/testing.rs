use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::{
    error::ClientError,
    transport::{ApiRequest, ApiResponse, HttpMethod, StoreTransport},
};

type Reply = Result<ApiResponse, ClientError>;

enum Scripted {
    Ready(Reply),
    Gated(oneshot::Receiver<Reply>),
}

/// Replies are queued per `(method, path)`, query strings ignored, and
/// consumed in order. Unscripted requests fail with a network error.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    replies: Mutex<HashMap<(HttpMethod, String), VecDeque<Scripted>>>,
    log: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, method: HttpMethod, path: &str, scripted: Scripted) {
        self.replies
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(scripted);
    }

    pub(crate) fn reply(&self, method: HttpMethod, path: &str, body: Value) {
        self.reply_status(method, path, 200, body);
    }

    pub(crate) fn reply_status(&self, method: HttpMethod, path: &str, status: u16, body: Value) {
        self.push(
            method,
            path,
            Scripted::Ready(Ok(ApiResponse { status, body })),
        );
    }

    pub(crate) fn fail(&self, method: HttpMethod, path: &str, err: ClientError) {
        self.push(method, path, Scripted::Ready(Err(err)));
    }

    /// The request blocks until the returned sender is used.
    pub(crate) fn gate(&self, method: HttpMethod, path: &str) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.push(method, path, Scripted::Gated(rx));
        tx
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, method: HttpMethod, path: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.method == method && request.path == path)
            .count()
    }
}

#[async_trait]
impl StoreTransport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let key = (request.method, request.path.clone());
        self.log.lock().unwrap().push(request);

        let next = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Scripted::Ready(reply)) => reply,
            Some(Scripted::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(ClientError::Network("gate dropped".to_string()))),
            None => Err(ClientError::Network(format!(
                "no scripted reply for {:?} {}",
                key.0, key.1
            ))),
        }
    }
}

/// Yields to other futures on the same task until `condition` holds.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

pub(crate) fn ok(body: Value) -> Reply {
    Ok(ApiResponse::ok(body))
}
