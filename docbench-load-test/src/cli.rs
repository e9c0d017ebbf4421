use clap::{Parser, ValueEnum};
use docbench_client::{LoadBalancing, Protocol};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{
    ConnectionSettings, IndexKind, IndexSpec, Names, Provisioning, QuerySettings, RequestBudget, RunConfiguration,
};
use crate::document::PayloadShape;
use crate::error::ConfigurationError;
use crate::testcase::TestCaseKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProtocolArg {
    Http1,
    Http2,
}

impl From<ProtocolArg> for Protocol {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::Http1 => Protocol::Http1,
            ProtocolArg::Http2 => Protocol::Http2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LoadBalancingArg {
    None,
    RoundRobin,
    OneRandom,
}

impl From<LoadBalancingArg> for LoadBalancing {
    fn from(arg: LoadBalancingArg) -> Self {
        match arg {
            LoadBalancingArg::None => LoadBalancing::None,
            LoadBalancingArg::RoundRobin => LoadBalancing::RoundRobin,
            LoadBalancingArg::OneRandom => LoadBalancing::OneRandom,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "docbench", version, about = "Document database load generator")]
pub struct Args {
    /// Comma separated list of test cases to run
    #[arg(short = 't', long = "test", value_enum, value_delimiter = ',', required = true)]
    pub test: Vec<TestCaseKind>,

    /// Number of operations per thread
    #[arg(long, default_value_t = 1000)]
    pub requests: u64,

    /// Seconds each test case runs; when > 0, --requests is ignored
    #[arg(long, default_value_t = 0)]
    pub duration: u64,

    /// Run all test cases this many times
    #[arg(long, default_value_t = 1)]
    pub runs: usize,

    /// Seconds to wait between runs
    #[arg(long, default_value_t = 0)]
    pub delay: u64,

    /// Comma separated list of host:port endpoints
    #[arg(short = 'e', long, value_delimiter = ',', default_value = "127.0.0.1:8529")]
    pub endpoints: Vec<String>,

    #[arg(short = 'u', long, default_value = "root")]
    pub user: String,

    #[arg(short = 'p', long, env = "DOCBENCH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Documents per operation, for APIs that support batching
    #[arg(long, default_value_t = 1)]
    pub batch_size: usize,

    /// Number of parallel client threads
    #[arg(long, default_value_t = 1)]
    pub threads: usize,

    #[arg(long, value_enum, default_value_t = ProtocolArg::Http1)]
    pub protocol: ProtocolArg,

    /// Connect with TLS
    #[arg(long)]
    pub ssl: bool,

    /// Load balancing strategy across endpoints
    #[arg(long, value_enum, default_value_t = LoadBalancingArg::None)]
    pub load_balancing: LoadBalancingArg,

    /// Parallel connections per thread
    #[arg(long, default_value_t = 1)]
    pub connections: usize,

    /// Drop the database before every run
    #[arg(long)]
    pub drop_db: bool,

    #[arg(long, default_value = "ArangoJavaBenchmarkDB")]
    pub database: String,

    #[arg(long, default_value = "ArangoJavaBenchmarkCollection")]
    pub collection: String,

    #[arg(long, default_value = "ArangoJavaBenchmarkGraph")]
    pub graph: String,

    #[arg(long, default_value = "ArangoJavaBenchmarkVertex")]
    pub vertex_collection: String,

    #[arg(long, default_value = "ArangoJavaBenchmarkEdge")]
    pub edge_collection: String,

    #[arg(long, default_value_t = 1)]
    pub number_of_shards: u32,

    #[arg(long, default_value_t = 1)]
    pub replication_factor: u32,

    #[arg(long)]
    pub wait_for_sync: bool,

    /// Document key prefix, needed when several invocations write to the same collection
    #[arg(long)]
    pub key_prefix: Option<String>,

    /// Ask the server for its endpoints and balance over them
    #[arg(long)]
    pub acquire_host_list: bool,

    /// Seconds between output rows
    #[arg(long, default_value_t = 1)]
    pub output_interval: u64,

    /// Number of string fields per document
    #[arg(long, default_value_t = 5)]
    pub doc_num_simple: usize,

    /// Number of large string fields per document
    #[arg(long, default_value_t = 0)]
    pub doc_num_large_simple: usize,

    /// Number of nested object fields per document
    #[arg(long, default_value_t = 0)]
    pub doc_num_objects: usize,

    /// Number of array fields per document
    #[arg(long, default_value_t = 0)]
    pub doc_num_arrays: usize,

    #[arg(long, default_value_t = 20)]
    pub doc_simple_size: usize,

    #[arg(long, default_value_t = 100)]
    pub doc_large_simple_size: usize,

    #[arg(long, default_value_t = 10)]
    pub doc_arrays_size: usize,

    /// Depth of nested object fields
    #[arg(long, default_value_t = 1)]
    pub doc_nesting_depth: usize,

    /// Index kinds on string fields
    #[arg(long, value_enum, value_delimiter = ',')]
    pub doc_index_simple: Vec<IndexKind>,

    #[arg(long, default_value_t = 1)]
    pub doc_num_index_simple: usize,

    /// Index kinds on large string fields
    #[arg(long, value_enum, value_delimiter = ',')]
    pub doc_index_large_simple: Vec<IndexKind>,

    #[arg(long, default_value_t = 1)]
    pub doc_num_index_large_simple: usize,

    /// Index kinds on array fields
    #[arg(long, value_enum, value_delimiter = ',')]
    pub doc_index_arrays: Vec<IndexKind>,

    #[arg(long, default_value_t = 1)]
    pub doc_num_index_arrays: usize,

    /// Index kinds on nested object fields
    #[arg(long, value_enum, value_delimiter = ',')]
    pub doc_index_objects: Vec<IndexKind>,

    #[arg(long, default_value_t = 1)]
    pub doc_num_index_objects: usize,

    /// Create an arangosearch view over the large string fields
    #[arg(long)]
    pub doc_view: bool,

    /// Print run and test case markers
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,

    /// Write rows to this file instead of stdout
    #[arg(long)]
    pub output_file: Option<PathBuf>,

    #[arg(long, default_value_t = 1000)]
    pub cursor_batch_size: u32,

    #[arg(long)]
    pub cursor_stream: bool,

    /// Query for aql-custom. Bind parameters: @@collection, @@vertex, @@edge, @graph, @doc, @docs, @key, @keys
    #[arg(long)]
    pub query: Option<String>,

    /// Record the latency of failed calls too
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub record_failed_latency: bool,

    /// Per-call deadline in seconds; 0 waits indefinitely
    #[arg(long, default_value_t = 0)]
    pub request_timeout: u64,
}

fn index_spec(kinds: Vec<IndexKind>, count: usize) -> IndexSpec {
    IndexSpec { kinds, count }
}

impl Args {
    /// Turn parsed arguments into a validated configuration.
    pub fn into_config(self) -> Result<RunConfiguration, ConfigurationError> {
        let config = RunConfiguration {
            test_cases: self.test,
            threads: self.threads,
            batch_size: self.batch_size,
            budget: RequestBudget::from_options(self.requests, Duration::from_secs(self.duration)),
            output_interval: Duration::from_secs(self.output_interval),
            runs: self.runs,
            delay: Duration::from_secs(self.delay),
            drop_db: self.drop_db,
            verbose: self.verbose,
            key_prefix: self.key_prefix.filter(|p| !p.is_empty()),
            record_failed_latency: self.record_failed_latency,
            request_timeout: (self.request_timeout > 0).then(|| Duration::from_secs(self.request_timeout)),
            output_file: self.output_file,
            connection: ConnectionSettings {
                endpoints: self.endpoints.into_iter().map(|e| e.trim().to_string()).collect(),
                user: self.user,
                password: self.password,
                protocol: self.protocol.into(),
                use_tls: self.ssl,
                load_balancing: self.load_balancing.into(),
                connections: self.connections,
                acquire_host_list: self.acquire_host_list,
            },
            names: Names {
                database: self.database,
                collection: self.collection,
                graph: self.graph,
                vertex_collection: self.vertex_collection,
                edge_collection: self.edge_collection,
            },
            provisioning: Provisioning {
                number_of_shards: self.number_of_shards,
                replication_factor: self.replication_factor,
                wait_for_sync: self.wait_for_sync,
                index_simple: index_spec(self.doc_index_simple, self.doc_num_index_simple),
                index_large: index_spec(self.doc_index_large_simple, self.doc_num_index_large_simple),
                index_arrays: index_spec(self.doc_index_arrays, self.doc_num_index_arrays),
                index_objects: index_spec(self.doc_index_objects, self.doc_num_index_objects),
                view: self.doc_view,
            },
            payload: PayloadShape {
                num_simple: self.doc_num_simple,
                simple_size: self.doc_simple_size,
                num_large: self.doc_num_large_simple,
                large_size: self.doc_large_simple_size,
                num_arrays: self.doc_num_arrays,
                array_size: self.doc_arrays_size,
                num_objects: self.doc_num_objects,
                nesting_depth: self.doc_nesting_depth,
            },
            query: QuerySettings {
                cursor_batch_size: self.cursor_batch_size,
                cursor_stream: self.cursor_stream,
                custom_query: self.query.filter(|q| !q.trim().is_empty()),
            },
        };
        config.validate()?;
        Ok(config)
    }
}
