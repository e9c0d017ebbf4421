use docbench_common::DocDbError;
use std::time::Duration;
use thiserror::Error;

/// Invalid command line or configuration. Fatal before any work starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("invalid value for {option}: {reason}")]
    InvalidValue { option: &'static str, reason: String },

    #[error("test case {test_case} does not support batch size {batch_size}; use batch size 1")]
    UnsupportedBatchSize { test_case: &'static str, batch_size: usize },

    #[error("test case aql-custom needs a query (--query)")]
    MissingQuery,

    #[error("invalid endpoint {0:?}: expected host:port")]
    InvalidEndpoint(String),

    #[error("no test case given")]
    NoTestCase,
}

/// A failed backend round trip. Recovered inside the test case loop.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    #[error(transparent)]
    Client(#[from] DocDbError),

    #[error("{operation} {succeeded} of {requested} documents")]
    Shortfall { operation: &'static str, succeeded: usize, requested: usize },

    #[error("failed to read document with key {0}")]
    MissingDocument(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,

    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Provisioning failed in a way the run cannot continue from.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SetupError {
    #[error("database {name} is not available: {source}")]
    Database { name: String, source: BackendError },

    #[error("could not connect for setup: {0}")]
    Connect(BackendError),
}

/// Anything that aborts a harness invocation.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("backend connection failed: {0}")]
    Backend(#[from] BackendError),

    #[error("database setup failed: {0}")]
    Setup(#[from] SetupError),

    #[error("output error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to spawn worker {index}: {source}")]
    WorkerSpawn { index: usize, source: std::io::Error },
}
