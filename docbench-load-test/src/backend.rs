//! The seam between test cases and the database under test.
//!
//! Test cases drive a synchronous [`Backend`] from their worker thread. The HTTP
//! implementation owns a current-thread tokio runtime and blocks on it for each
//! call, racing the call against the per-call deadline and the [`StopSignal`].

use docbench_client::Client;
use docbench_common::{CursorOptions, CursorRequest, DocDbError, Document, DocumentOutcome};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tracing::debug;

use crate::config::RunConfiguration;
use crate::error::BackendError;

/// Cooperative cancellation shared by the orchestrator, workers and backends.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`stop`](Self::stop) has been called.
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
    Replace,
}

/// Result of a write touching several documents in one round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub succeeded: usize,
    /// Message of the first per-document error, if any.
    pub first_error: Option<String>,
}

impl BatchOutcome {
    pub fn all(n: usize) -> Self {
        Self { succeeded: n, first_error: None }
    }

    fn from_outcomes(outcomes: Vec<DocumentOutcome>) -> Self {
        let mut result = BatchOutcome::default();
        for outcome in outcomes {
            match outcome {
                DocumentOutcome::Ok(_) => result.succeeded += 1,
                DocumentOutcome::Failed(entry) => {
                    result.first_error.get_or_insert(entry.error_message);
                }
            }
        }
        result
    }
}

/// A cursor query with its bind parameters and cursor options.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub query: String,
    pub bind_vars: Map<String, Value>,
    pub batch_size: u32,
    pub stream: bool,
}

/// One connection to the database under test, used by a single worker.
pub trait Backend: Send {
    fn version(&mut self) -> Result<(), BackendError>;

    /// Write `docs`. A single document goes through the single-document
    /// endpoint, so its failure is an `Err`; batches report per-document outcomes.
    fn write_documents(&mut self, kind: WriteKind, collection: &str, docs: &[Document])
        -> Result<BatchOutcome, BackendError>;

    /// Documents found for `keys`. Missing documents are left out.
    fn read_documents(&mut self, collection: &str, keys: &[String]) -> Result<Vec<Document>, BackendError>;

    fn import_documents(&mut self, collection: &str, docs: &[Document]) -> Result<BatchOutcome, BackendError>;

    /// Run a query and collect every result batch.
    fn query(&mut self, request: &QueryRequest) -> Result<Vec<Value>, BackendError>;

    fn insert_edge(&mut self, graph: &str, collection: &str, edge: &Document) -> Result<(), BackendError>;

    fn replace_vertex(&mut self, graph: &str, collection: &str, key: &str, vertex: &Document)
        -> Result<(), BackendError>;

    fn close(&mut self) {}
}

/// Opens backend connections; shared by all workers of a test case run.
pub trait BackendFactory: Send + Sync {
    fn connect(&self) -> Result<Box<dyn Backend>, BackendError>;
}

pub struct HttpBackend {
    client: Client,
    runtime: Runtime,
    timeout: Option<Duration>,
    stop: StopSignal,
}

impl HttpBackend {
    fn call<T, F>(&self, fut: F) -> Result<T, BackendError>
    where
        F: Future<Output = docbench_common::Result<T>>,
    {
        let stop = self.stop.clone();
        let limit = self.timeout;
        self.runtime.block_on(async move {
            tokio::select! {
                biased;
                _ = stop.stopped() => Err(BackendError::Cancelled),
                result = with_deadline(fut, limit) => result,
            }
        })
    }
}

async fn with_deadline<T, F>(fut: F, limit: Option<Duration>) -> Result<T, BackendError>
where
    F: Future<Output = docbench_common::Result<T>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.map_err(BackendError::from),
            Err(_) => Err(BackendError::Timeout(limit)),
        },
        None => fut.await.map_err(BackendError::from),
    }
}

impl Backend for HttpBackend {
    fn version(&mut self) -> Result<(), BackendError> {
        self.call(self.client.version()).map(|_| ())
    }

    fn write_documents(
        &mut self,
        kind: WriteKind,
        collection: &str,
        docs: &[Document],
    ) -> Result<BatchOutcome, BackendError> {
        if let [doc] = docs {
            let key = docbench_common::document_key(doc).unwrap_or_default();
            match kind {
                WriteKind::Insert => self.call(self.client.insert_document(collection, doc))?,
                WriteKind::Update => self.call(self.client.update_document(collection, key, doc))?,
                WriteKind::Replace => self.call(self.client.replace_document(collection, key, doc))?,
            };
            return Ok(BatchOutcome::all(1));
        }
        let outcomes = match kind {
            WriteKind::Insert => self.call(self.client.insert_documents(collection, docs))?,
            WriteKind::Update => self.call(self.client.update_documents(collection, docs))?,
            WriteKind::Replace => self.call(self.client.replace_documents(collection, docs))?,
        };
        Ok(BatchOutcome::from_outcomes(outcomes))
    }

    fn read_documents(&mut self, collection: &str, keys: &[String]) -> Result<Vec<Document>, BackendError> {
        if let [key] = keys {
            return match self.call(self.client.get_document(collection, key)) {
                Ok(doc) => Ok(vec![doc]),
                Err(BackendError::Client(DocDbError::NotFound(_))) => Ok(Vec::new()),
                Err(e) => Err(e),
            };
        }
        let outcomes = self.call(self.client.get_documents(collection, keys))?;
        Ok(outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                DocumentOutcome::Ok(doc) => Some(doc),
                DocumentOutcome::Failed(_) => None,
            })
            .collect())
    }

    fn import_documents(&mut self, collection: &str, docs: &[Document]) -> Result<BatchOutcome, BackendError> {
        let result = self.call(self.client.import_documents(collection, docs))?;
        let first_error = (result.errors > 0).then(|| format!("{} documents rejected", result.errors));
        Ok(BatchOutcome { succeeded: result.created as usize, first_error })
    }

    fn query(&mut self, request: &QueryRequest) -> Result<Vec<Value>, BackendError> {
        let cursor = CursorRequest {
            query: request.query.clone(),
            bind_vars: request.bind_vars.clone(),
            batch_size: Some(request.batch_size),
            options: CursorOptions { stream: request.stream },
        };
        self.call(self.client.query(&cursor))
    }

    fn insert_edge(&mut self, graph: &str, collection: &str, edge: &Document) -> Result<(), BackendError> {
        self.call(self.client.insert_edge(graph, collection, edge))
    }

    fn replace_vertex(
        &mut self,
        graph: &str,
        collection: &str,
        key: &str,
        vertex: &Document,
    ) -> Result<(), BackendError> {
        self.call(self.client.replace_vertex(graph, collection, key, vertex))
    }

    fn close(&mut self) {
        debug!(hosts = ?self.client.hosts(), "closing backend connection");
    }
}

/// Connects [`HttpBackend`]s with the run's client settings.
pub struct HttpBackendFactory {
    config: docbench_client::ClientConfig,
    acquire_host_list: bool,
    timeout: Option<Duration>,
    stop: StopSignal,
}

impl HttpBackendFactory {
    pub fn new(config: &RunConfiguration, stop: StopSignal) -> Self {
        Self {
            config: config.client_config(),
            acquire_host_list: config.connection.acquire_host_list,
            timeout: config.request_timeout,
            stop,
        }
    }
}

impl BackendFactory for HttpBackendFactory {
    fn connect(&self) -> Result<Box<dyn Backend>, BackendError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| BackendError::Runtime(e.to_string()))?;
        let mut client = {
            let _guard = runtime.enter();
            Client::new(self.config.clone())?
        };
        if self.acquire_host_list {
            runtime.block_on(client.acquire_host_list())?;
        }
        debug!(hosts = ?client.hosts(), "backend connected");
        Ok(Box::new(HttpBackend { client, runtime, timeout: self.timeout, stop: self.stop.clone() }))
    }
}
