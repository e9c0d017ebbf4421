use clap::ValueEnum;
use docbench_client::{ClientConfig, Credentials, LoadBalancing, Protocol};
use std::path::PathBuf;
use std::time::Duration;

use crate::document::PayloadShape;
use crate::error::ConfigurationError;
use crate::testcase::TestCaseKind;

/// How long each worker keeps issuing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestBudget {
    Requests(u64),
    Duration(Duration),
}

impl RequestBudget {
    /// A positive duration takes precedence over the request count.
    pub fn from_options(requests: u64, duration: Duration) -> Self {
        if duration > Duration::ZERO {
            RequestBudget::Duration(duration)
        } else {
            RequestBudget::Requests(requests)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IndexKind {
    Hash,
    Skiplist,
    Persistent,
    Geo,
    Fulltext,
}

impl IndexKind {
    /// Type name used by the index API.
    pub fn as_str(self) -> &'static str {
        match self {
            IndexKind::Hash => "hash",
            IndexKind::Skiplist => "skiplist",
            IndexKind::Persistent => "persistent",
            IndexKind::Geo => "geo",
            IndexKind::Fulltext => "fulltext",
        }
    }
}

/// Indexes to create on the first `count` fields of one field family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub kinds: Vec<IndexKind>,
    pub count: usize,
}

impl Default for IndexSpec {
    fn default() -> Self {
        Self { kinds: Vec::new(), count: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// `host:port` entries.
    pub endpoints: Vec<String>,
    pub user: String,
    pub password: Option<String>,
    pub protocol: Protocol,
    pub use_tls: bool,
    pub load_balancing: LoadBalancing,
    /// Pooled connections per worker thread.
    pub connections: usize,
    pub acquire_host_list: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            endpoints: vec!["127.0.0.1:8529".to_string()],
            user: "root".to_string(),
            password: None,
            protocol: Protocol::Http1,
            use_tls: false,
            load_balancing: LoadBalancing::None,
            connections: 1,
            acquire_host_list: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Names {
    pub database: String,
    pub collection: String,
    pub graph: String,
    pub vertex_collection: String,
    pub edge_collection: String,
}

impl Default for Names {
    fn default() -> Self {
        Self {
            database: "ArangoJavaBenchmarkDB".to_string(),
            collection: "ArangoJavaBenchmarkCollection".to_string(),
            graph: "ArangoJavaBenchmarkGraph".to_string(),
            vertex_collection: "ArangoJavaBenchmarkVertex".to_string(),
            edge_collection: "ArangoJavaBenchmarkEdge".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioning {
    pub number_of_shards: u32,
    pub replication_factor: u32,
    pub wait_for_sync: bool,
    pub index_simple: IndexSpec,
    pub index_large: IndexSpec,
    pub index_arrays: IndexSpec,
    pub index_objects: IndexSpec,
    /// Create an arangosearch view over the large string fields.
    pub view: bool,
}

impl Default for Provisioning {
    fn default() -> Self {
        Self {
            number_of_shards: 1,
            replication_factor: 1,
            wait_for_sync: false,
            index_simple: IndexSpec::default(),
            index_large: IndexSpec::default(),
            index_arrays: IndexSpec::default(),
            index_objects: IndexSpec::default(),
            view: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySettings {
    pub cursor_batch_size: u32,
    pub cursor_stream: bool,
    /// Query run by `aql-custom`.
    pub custom_query: Option<String>,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self { cursor_batch_size: 1000, cursor_stream: false, custom_query: None }
    }
}

/// Everything one harness invocation needs. Immutable once workers start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfiguration {
    pub test_cases: Vec<TestCaseKind>,
    pub threads: usize,
    pub batch_size: usize,
    pub budget: RequestBudget,
    pub output_interval: Duration,
    pub runs: usize,
    pub delay: Duration,
    pub drop_db: bool,
    pub verbose: bool,
    pub key_prefix: Option<String>,
    /// Record the latency of calls that failed as well as successful ones.
    pub record_failed_latency: bool,
    /// Deadline for a single backend call; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    pub output_file: Option<PathBuf>,
    pub connection: ConnectionSettings,
    pub names: Names,
    pub provisioning: Provisioning,
    pub payload: PayloadShape,
    pub query: QuerySettings,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            test_cases: Vec::new(),
            threads: 1,
            batch_size: 1,
            budget: RequestBudget::Requests(1000),
            output_interval: Duration::from_secs(1),
            runs: 1,
            delay: Duration::ZERO,
            drop_db: false,
            verbose: true,
            key_prefix: None,
            record_failed_latency: true,
            request_timeout: None,
            output_file: None,
            connection: ConnectionSettings::default(),
            names: Names::default(),
            provisioning: Provisioning::default(),
            payload: PayloadShape::default(),
            query: QuerySettings::default(),
        }
    }
}

impl RunConfiguration {
    /// Reject configurations the harness cannot run.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.test_cases.is_empty() {
            return Err(ConfigurationError::NoTestCase);
        }
        for (option, value) in [
            ("threads", self.threads),
            ("batch-size", self.batch_size),
            ("runs", self.runs),
            ("connections", self.connection.connections),
        ] {
            if value == 0 {
                return Err(ConfigurationError::InvalidValue { option, reason: "must be at least 1".to_string() });
            }
        }
        if self.output_interval.is_zero() {
            return Err(ConfigurationError::InvalidValue {
                option: "output-interval",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.connection.endpoints.is_empty() {
            return Err(ConfigurationError::InvalidValue {
                option: "endpoints",
                reason: "at least one endpoint is required".to_string(),
            });
        }
        for endpoint in &self.connection.endpoints {
            validate_endpoint(endpoint)?;
        }
        if let Some(prefix) = &self.key_prefix {
            validate_key_prefix(prefix)?;
        }
        for kind in &self.test_cases {
            kind.check_supported(self)?;
        }
        Ok(())
    }

    /// Whether any configured test case works on the graph collections.
    pub fn needs_graph(&self) -> bool {
        self.test_cases.iter().any(|kind| kind.needs_graph())
    }

    pub fn client_config(&self) -> ClientConfig {
        let connection = &self.connection;
        ClientConfig {
            hosts: connection.endpoints.clone(),
            database: self.names.database.clone(),
            credentials: Some(Credentials { user: connection.user.clone(), password: connection.password.clone() }),
            use_tls: connection.use_tls,
            protocol: connection.protocol,
            load_balancing: connection.load_balancing,
            max_connections: connection.connections,
        }
    }
}

/// Keys end up as URL path segments, so the prefix is limited to characters
/// that are legal in a document key and need no escaping.
fn validate_key_prefix(prefix: &str) -> Result<(), ConfigurationError> {
    const PUNCTUATION: &str = "_-:.@()+,=;$!*'";
    if let Some(c) = prefix.chars().find(|c| !c.is_ascii_alphanumeric() && !PUNCTUATION.contains(*c)) {
        return Err(ConfigurationError::InvalidValue {
            option: "key-prefix",
            reason: format!("character {:?} is not allowed in a document key", c),
        });
    }
    Ok(())
}

/// `host:port` with a non-empty host and a numeric port.
fn validate_endpoint(endpoint: &str) -> Result<(), ConfigurationError> {
    let invalid = || ConfigurationError::InvalidEndpoint(endpoint.to_string());
    let (host, port) = endpoint.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(invalid());
    }
    Ok(())
}
