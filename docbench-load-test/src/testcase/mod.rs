//! Test cases: the unit of work a worker repeats.
//!
//! Each variant implements [`Operation`]. [`TestCase`] wraps an operation in the
//! fixed measure-and-record loop body and guarantees the operation is closed once.

use clap::ValueEnum;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

use crate::aggregator::LatencySink;
use crate::backend::{Backend, BackendFactory, WriteKind};
use crate::config::RunConfiguration;
use crate::document::DocumentCreator;
use crate::error::{BackendError, ConfigurationError, HarnessError};
use crate::keygen::KeyGenerator;
use crate::stopwatch::Stopwatch;

mod aql;
mod document;
mod graph;

use aql::{AqlCustom, AqlRead, AqlReplace};
pub use aql::{READ_MANY_QUERY, READ_ONE_QUERY, REPLACE_MANY_QUERY, REPLACE_ONE_QUERY};
use document::{DocumentImport, DocumentRead, DocumentWrite, VersionCheck};
use graph::{EdgeInsert, VertexReplace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum TestCaseKind {
    #[value(name = "version")]
    VersionCheck,
    #[value(name = "document-insert")]
    DocumentInsert,
    #[value(name = "document-get")]
    DocumentRead,
    #[value(name = "document-update")]
    DocumentUpdate,
    #[value(name = "document-replace")]
    DocumentReplace,
    #[value(name = "document-import")]
    DocumentImport,
    #[value(name = "aql-get")]
    AqlRead,
    #[value(name = "aql-replace")]
    AqlReplace,
    #[value(name = "aql-custom")]
    AqlCustom,
    #[value(name = "edge-insert")]
    EdgeInsert,
    #[value(name = "vertex-replace")]
    VertexReplace,
}

impl TestCaseKind {
    /// Name used on the command line and in output.
    pub fn name(self) -> &'static str {
        match self {
            TestCaseKind::VersionCheck => "version",
            TestCaseKind::DocumentInsert => "document-insert",
            TestCaseKind::DocumentRead => "document-get",
            TestCaseKind::DocumentUpdate => "document-update",
            TestCaseKind::DocumentReplace => "document-replace",
            TestCaseKind::DocumentImport => "document-import",
            TestCaseKind::AqlRead => "aql-get",
            TestCaseKind::AqlReplace => "aql-replace",
            TestCaseKind::AqlCustom => "aql-custom",
            TestCaseKind::EdgeInsert => "edge-insert",
            TestCaseKind::VertexReplace => "vertex-replace",
        }
    }

    /// Whether the test case needs the graph, its collections and the dummy vertex.
    pub fn needs_graph(self) -> bool {
        matches!(self, TestCaseKind::EdgeInsert | TestCaseKind::VertexReplace | TestCaseKind::AqlCustom)
    }

    /// Preconditions that can be checked without touching the database.
    pub fn check_supported(self, config: &RunConfiguration) -> Result<(), ConfigurationError> {
        match self {
            TestCaseKind::EdgeInsert | TestCaseKind::VertexReplace if config.batch_size != 1 => {
                Err(ConfigurationError::UnsupportedBatchSize { test_case: self.name(), batch_size: config.batch_size })
            }
            TestCaseKind::AqlCustom
                if config.query.custom_query.as_deref().map_or(true, |q| q.trim().is_empty()) =>
            {
                Err(ConfigurationError::MissingQuery)
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for TestCaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The part of a test case that differs per variant.
pub trait Operation: Send {
    /// Produce the keys and payload for the next call. Never touches the backend.
    fn prepare(&mut self) -> Result<(), ConfigurationError>;

    /// Exactly one backend round trip.
    fn execute(&mut self) -> Result<(), BackendError>;

    /// Release the backend connection.
    fn close(&mut self);
}

/// A measured operation feeding one latency slot.
pub struct TestCase {
    kind: TestCaseKind,
    operation: Box<dyn Operation>,
    sink: LatencySink,
    record_failed_latency: bool,
    executions: u64,
    failures: u64,
    closed: bool,
}

impl TestCase {
    pub fn new(
        kind: TestCaseKind,
        operation: Box<dyn Operation>,
        sink: LatencySink,
        record_failed_latency: bool,
    ) -> Self {
        Self { kind, operation, sink, record_failed_latency, executions: 0, failures: 0, closed: false }
    }

    /// Prepare, then time one execution and record its latency.
    ///
    /// A backend failure is logged and counted but does not fail the run; only
    /// an error from `prepare` escapes.
    pub fn run(&mut self) -> Result<(), ConfigurationError> {
        self.operation.prepare()?;
        let stopwatch = Stopwatch::start();
        let result = self.operation.execute();
        let elapsed = stopwatch.elapsed();
        self.executions += 1;
        match result {
            Ok(()) => self.sink.append(elapsed),
            Err(e) => {
                self.failures += 1;
                error!(test_case = %self.kind, slot = self.sink.slot(), error = %e, "error during test run");
                if self.record_failed_latency {
                    self.sink.append(elapsed);
                }
            }
        }
        Ok(())
    }

    pub fn kind(&self) -> TestCaseKind {
        self.kind
    }

    pub fn executions(&self) -> u64 {
        self.executions
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the operation. Later calls are no-ops.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.operation.close();
            debug!(test_case = %self.kind, slot = self.sink.slot(), "test case closed");
        }
    }
}

impl Drop for TestCase {
    fn drop(&mut self) {
        self.close();
    }
}

/// State shared by every variant: the connection, key source and settings.
pub(crate) struct Session {
    pub backend: Box<dyn Backend>,
    pub config: Arc<RunConfiguration>,
    pub keygen: KeyGenerator,
    pub keys: Vec<String>,
}

impl Session {
    fn new(backend: Box<dyn Backend>, config: Arc<RunConfiguration>, run_index: usize, worker_index: usize) -> Self {
        let keygen = KeyGenerator::new(run_index, worker_index, config.key_prefix.as_deref());
        Self { backend, config, keygen, keys: Vec::new() }
    }

    fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    /// Draw a fresh batch of keys.
    fn next_keys(&mut self) {
        self.keys = self.keygen.generate_keys(self.config.batch_size);
    }

    fn first_key(&self) -> Result<&str, BackendError> {
        self.keys
            .first()
            .map(String::as_str)
            .ok_or_else(|| BackendError::Runtime("no key prepared".to_string()))
    }

    fn close(&mut self) {
        self.backend.close();
    }
}

/// Fail with a shortfall unless all `requested` documents were handled.
fn expect_all(operation: &'static str, succeeded: usize, requested: usize) -> Result<(), BackendError> {
    if succeeded == requested {
        Ok(())
    } else {
        Err(BackendError::Shortfall { operation, succeeded, requested })
    }
}

/// Build the operation for `kind` on top of an open backend.
pub fn build_operation(
    kind: TestCaseKind,
    backend: Box<dyn Backend>,
    config: Arc<RunConfiguration>,
    run_index: usize,
    worker_index: usize,
) -> Box<dyn Operation> {
    let creator = || DocumentCreator::new(&config.payload, config.batch_size);
    let session = Session::new(backend, Arc::clone(&config), run_index, worker_index);
    match kind {
        TestCaseKind::VersionCheck => Box::new(VersionCheck::new(session)),
        TestCaseKind::DocumentInsert => Box::new(DocumentWrite::new(session, WriteKind::Insert, creator())),
        TestCaseKind::DocumentUpdate => Box::new(DocumentWrite::new(session, WriteKind::Update, creator())),
        TestCaseKind::DocumentReplace => Box::new(DocumentWrite::new(session, WriteKind::Replace, creator())),
        TestCaseKind::DocumentRead => Box::new(DocumentRead::new(session)),
        TestCaseKind::DocumentImport => Box::new(DocumentImport::new(session, creator())),
        TestCaseKind::AqlRead => Box::new(AqlRead::new(session)),
        TestCaseKind::AqlReplace => Box::new(AqlReplace::new(session, creator())),
        TestCaseKind::AqlCustom => Box::new(AqlCustom::new(session, creator())),
        TestCaseKind::EdgeInsert => Box::new(EdgeInsert::new(session, creator())),
        TestCaseKind::VertexReplace => Box::new(VertexReplace::new(session, creator())),
    }
}

/// Check `kind`'s preconditions, connect a backend and wrap the operation in a [`TestCase`].
pub fn create_test_case(
    kind: TestCaseKind,
    config: &Arc<RunConfiguration>,
    factory: &dyn BackendFactory,
    run_index: usize,
    worker_index: usize,
    sink: LatencySink,
) -> Result<TestCase, HarnessError> {
    kind.check_supported(config)?;
    let backend = factory.connect()?;
    let operation = build_operation(kind, backend, Arc::clone(config), run_index, worker_index);
    Ok(TestCase::new(kind, operation, sink, config.record_failed_latency))
}
