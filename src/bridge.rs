//! Async request/response boundary in front of the [`Registry`].
//!
//! A background task receives `(Request, reply)` pairs over an mpsc channel and
//! runs each one on the blocking pool, answering through a oneshot. Callers hold
//! a cheap [`BridgeClient`]; each call is independent and carries no session.

mod protocol;

pub use protocol::{Request, Response, dispatch, dispatch_json};

use crate::errors::DbError;
use crate::query::{Patch, Query, RemoveOptions, UpdateOptions};
use crate::registry::Registry;
use crate::types::Document;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const QUEUE_DEPTH: usize = 1024;

struct Call {
    request: Request,
    reply: oneshot::Sender<Result<Response, DbError>>,
}

/// The serving side. Dropping every client (including [`Bridge::client`]'s) stops the task.
pub struct Bridge {
    client: BridgeClient,
    task: JoinHandle<()>,
}

impl Bridge {
    /// Start serving `registry`. Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(registry: Arc<Registry>) -> Self {
        let (tx, rx) = mpsc::channel::<Call>(QUEUE_DEPTH);
        let task = tokio::spawn(serve(registry, rx));
        Self { client: BridgeClient { tx }, task }
    }

    #[must_use]
    pub fn client(&self) -> BridgeClient {
        self.client.clone()
    }

    /// Stop accepting work from this handle and wait for the server to drain.
    /// Returns once every other client has been dropped too.
    pub async fn join(self) {
        drop(self.client);
        if let Err(e) = self.task.await {
            log::error!("bridge task ended abnormally: {e}");
        }
    }

    /// Stop serving now. Calls already running finish; later ones fail with `BridgeClosed`.
    pub async fn shutdown(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

async fn serve(registry: Arc<Registry>, mut rx: mpsc::Receiver<Call>) {
    while let Some(call) = rx.recv().await {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let Call { request, reply } = call;
            let outcome = tokio::task::spawn_blocking(move || dispatch(&registry, request))
                .await
                .unwrap_or_else(|e| Err(DbError::StorageFault(format!("bridge worker failed: {e}"))));
            // The caller may have stopped waiting; nothing to do then.
            let _ = reply.send(outcome);
        });
    }
    log::debug!("bridge closed: all clients dropped");
}

#[derive(Clone)]
pub struct BridgeClient {
    tx: mpsc::Sender<Call>,
}

impl std::fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeClient").field("closed", &self.tx.is_closed()).finish()
    }
}

fn unexpected(op: &str, resp: &Response) -> DbError {
    DbError::StorageFault(format!("bridge returned an unexpected payload for {op}: {resp:?}"))
}

impl BridgeClient {
    /// Send one request and await its result.
    ///
    /// # Errors
    /// `BridgeClosed` if the server is gone, otherwise the operation's own error.
    pub async fn call(&self, request: Request) -> Result<Response, DbError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Call { request, reply }).await.map_err(|_| DbError::BridgeClosed)?;
        rx.await.map_err(|_| DbError::BridgeClosed)?
    }

    pub async fn get(&self, collection: &str, query: Query) -> Result<Vec<Document>, DbError> {
        match self.call(Request::Get { collection: collection.to_string(), query }).await? {
            Response::Documents(d) => Ok(d),
            other => Err(unexpected("get", &other)),
        }
    }

    pub async fn get_one(&self, collection: &str, query: Query) -> Result<Option<Document>, DbError> {
        match self.call(Request::GetOne { collection: collection.to_string(), query }).await? {
            Response::Document(d) => Ok(d),
            other => Err(unexpected("getOne", &other)),
        }
    }

    pub async fn insert(&self, collection: &str, document: Document) -> Result<Document, DbError> {
        match self.call(Request::Insert { collection: collection.to_string(), document }).await? {
            Response::Document(Some(d)) => Ok(d),
            other => Err(unexpected("insert", &other)),
        }
    }

    pub async fn update(
        &self,
        collection: &str,
        query: Query,
        patch: Patch,
        options: UpdateOptions,
    ) -> Result<usize, DbError> {
        let req = Request::Update { collection: collection.to_string(), query, patch, options };
        match self.call(req).await? {
            Response::Count(n) => Ok(n),
            other => Err(unexpected("update", &other)),
        }
    }

    pub async fn remove(
        &self,
        collection: &str,
        query: Query,
        options: RemoveOptions,
    ) -> Result<usize, DbError> {
        let req = Request::Remove { collection: collection.to_string(), query, options };
        match self.call(req).await? {
            Response::Count(n) => Ok(n),
            other => Err(unexpected("remove", &other)),
        }
    }

    pub async fn count(&self, collection: &str, query: Query) -> Result<usize, DbError> {
        match self.call(Request::Count { collection: collection.to_string(), query }).await? {
            Response::Count(n) => Ok(n),
            other => Err(unexpected("count", &other)),
        }
    }
}
