#![allow(dead_code)]

use docbench_common::{document_key, DocDbError, Document};
use docbench_load_test::backend::{Backend, BackendFactory, BatchOutcome, QueryRequest, WriteKind};
use docbench_load_test::config::{RequestBudget, RunConfiguration};
use docbench_load_test::error::{BackendError, SetupError};
use docbench_load_test::setup::DatabaseSetup;
use docbench_load_test::testcase::TestCaseKind;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Version,
    Write { kind: WriteKind, collection: String, keys: Vec<String> },
    Read { collection: String, keys: Vec<String> },
    Import { collection: String, count: usize },
    Query(QueryRequest),
    InsertEdge { graph: String, collection: String, edge: Document },
    ReplaceVertex { graph: String, collection: String, key: String },
    Close,
}

/// How the stub answers.
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    pub delay: Duration,
    /// Cap on documents returned by reads; `None` finds every key.
    pub found: Option<usize>,
    pub fail: bool,
}

pub struct StubBackend {
    calls: Arc<Mutex<Vec<Call>>>,
    behavior: Behavior,
}

impl StubBackend {
    fn record(&self, call: Call) -> Result<(), BackendError> {
        if !self.behavior.delay.is_zero() {
            thread::sleep(self.behavior.delay);
        }
        self.calls.lock().unwrap().push(call);
        if self.behavior.fail {
            return Err(BackendError::Client(DocDbError::HttpError(500, "stub failure".to_string())));
        }
        Ok(())
    }
}

fn keys_of(docs: &[Document]) -> Vec<String> {
    docs.iter().filter_map(|d| document_key(d).map(str::to_string)).collect()
}

impl Backend for StubBackend {
    fn version(&mut self) -> Result<(), BackendError> {
        self.record(Call::Version)
    }

    fn write_documents(
        &mut self,
        kind: WriteKind,
        collection: &str,
        docs: &[Document],
    ) -> Result<BatchOutcome, BackendError> {
        self.record(Call::Write { kind, collection: collection.to_string(), keys: keys_of(docs) })?;
        Ok(BatchOutcome::all(docs.len()))
    }

    fn read_documents(&mut self, collection: &str, keys: &[String]) -> Result<Vec<Document>, BackendError> {
        self.record(Call::Read { collection: collection.to_string(), keys: keys.to_vec() })?;
        let found = self.behavior.found.unwrap_or(keys.len()).min(keys.len());
        Ok(keys[..found]
            .iter()
            .map(|k| {
                let mut doc = Document::new();
                doc.insert("_key".to_string(), Value::String(k.clone()));
                doc
            })
            .collect())
    }

    fn import_documents(&mut self, collection: &str, docs: &[Document]) -> Result<BatchOutcome, BackendError> {
        self.record(Call::Import { collection: collection.to_string(), count: docs.len() })?;
        Ok(BatchOutcome::all(docs.len()))
    }

    fn query(&mut self, request: &QueryRequest) -> Result<Vec<Value>, BackendError> {
        self.record(Call::Query(request.clone()))?;
        let rows = match (request.bind_vars.get("key"), request.bind_vars.get("keys")) {
            (Some(_), _) => 1,
            (_, Some(Value::Array(keys))) => keys.len(),
            _ => 0,
        };
        let rows = self.behavior.found.map_or(rows, |cap| rows.min(cap));
        Ok(vec![Value::Null; rows])
    }

    fn insert_edge(&mut self, graph: &str, collection: &str, edge: &Document) -> Result<(), BackendError> {
        self.record(Call::InsertEdge { graph: graph.to_string(), collection: collection.to_string(), edge: edge.clone() })
    }

    fn replace_vertex(
        &mut self,
        graph: &str,
        collection: &str,
        key: &str,
        _vertex: &Document,
    ) -> Result<(), BackendError> {
        self.record(Call::ReplaceVertex {
            graph: graph.to_string(),
            collection: collection.to_string(),
            key: key.to_string(),
        })
    }

    fn close(&mut self) {
        self.calls.lock().unwrap().push(Call::Close);
    }
}

#[derive(Default)]
pub struct StubFactory {
    pub calls: Arc<Mutex<Vec<Call>>>,
    pub behavior: Behavior,
    pub connects: AtomicUsize,
}

impl StubFactory {
    pub fn with_behavior(behavior: Behavior) -> Self {
        Self { behavior, ..Self::default() }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl BackendFactory for StubFactory {
    fn connect(&self) -> Result<Box<dyn Backend>, BackendError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubBackend { calls: Arc::clone(&self.calls), behavior: self.behavior.clone() }))
    }
}

/// Records each setup call as `drop_first`.
#[derive(Default, Clone)]
pub struct RecordingSetup {
    pub calls: Arc<Mutex<Vec<bool>>>,
}

impl DatabaseSetup for RecordingSetup {
    fn setup(&self, _config: &RunConfiguration, drop_first: bool) -> Result<(), SetupError> {
        self.calls.lock().unwrap().push(drop_first);
        Ok(())
    }
}

pub fn config(kind: TestCaseKind, threads: usize, batch_size: usize, requests: u64) -> RunConfiguration {
    RunConfiguration {
        test_cases: vec![kind],
        threads,
        batch_size,
        budget: RequestBudget::Requests(requests),
        output_interval: Duration::from_millis(20),
        ..RunConfiguration::default()
    }
}
