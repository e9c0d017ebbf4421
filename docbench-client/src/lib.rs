use docbench_common::{
    ClusterEndpoints, CollectionCreateRequest, CollectionInfo, CursorRequest, CursorResponse,
    DatabaseCreateRequest, DocDbError, Document, DocumentOutcome, ErrorResponse,
    GraphCreateRequest, ImportResult, IndexCreateRequest, IndexInfo, Result, VersionInfo,
    ViewCreateRequest,
};
use rand::Rng;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// How requests are spread over the configured hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadBalancing {
    /// Every request goes to the first host.
    #[default]
    None,
    /// Requests rotate through all hosts.
    RoundRobin,
    /// One host is picked at random when the client is created.
    OneRandom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Http1,
    Http2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: Option<String>,
}

/// Document database client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `host:port` entries.
    pub hosts: Vec<String>,
    pub database: String,
    pub credentials: Option<Credentials>,
    pub use_tls: bool,
    pub protocol: Protocol,
    pub load_balancing: LoadBalancing,
    /// Idle connections kept per host.
    pub max_connections: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["127.0.0.1:8529".to_string()],
            database: "_system".to_string(),
            credentials: None,
            use_tls: false,
            protocol: Protocol::Http1,
            load_balancing: LoadBalancing::None,
            max_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum WriteMethod {
    Insert,
    Update,
    Replace,
}

impl WriteMethod {
    fn http_method(self) -> Method {
        match self {
            WriteMethod::Insert => Method::POST,
            WriteMethod::Update => Method::PATCH,
            WriteMethod::Replace => Method::PUT,
        }
    }
}

/// Document database client
pub struct Client {
    pub config: ClientConfig,
    hosts: Vec<String>,
    /// Round-robin cursor, or the fixed pick for `LoadBalancing::OneRandom`.
    next_host: AtomicUsize,
    http_client: reqwest::Client,
}

impl Client {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.hosts.is_empty() {
            return Err(DocDbError::BadRequest("no endpoints configured".to_string()));
        }

        let mut builder =
            reqwest::Client::builder().pool_max_idle_per_host(config.max_connections.max(1));
        if config.protocol == Protocol::Http2 {
            builder = builder.http2_prior_knowledge();
        }
        let http_client = builder
            .build()
            .map_err(|e| DocDbError::NetworkError(e.to_string()))?;

        let start = match config.load_balancing {
            LoadBalancing::OneRandom => rand::thread_rng().gen_range(0..config.hosts.len()),
            _ => 0,
        };

        Ok(Self {
            hosts: config.hosts.clone(),
            config,
            next_host: AtomicUsize::new(start),
            http_client,
        })
    }

    /// Hosts currently used for requests.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Pick the host for the next request according to the load balancing strategy.
    pub fn host(&self) -> &str {
        let idx = match self.config.load_balancing {
            LoadBalancing::None => 0,
            LoadBalancing::RoundRobin => self.next_host.fetch_add(1, Ordering::Relaxed),
            LoadBalancing::OneRandom => self.next_host.load(Ordering::Relaxed),
        };
        &self.hosts[idx % self.hosts.len()]
    }

    /// Build an absolute URL for a server-level path such as `/_api/version`.
    pub fn build_url(&self, path: &str) -> String {
        self.build_url_on(self.host(), path)
    }

    /// Build an absolute URL for a path scoped to the configured database.
    pub fn build_db_url(&self, path: &str) -> String {
        self.build_db_url_on(self.host(), path)
    }

    fn build_url_on(&self, host: &str, path: &str) -> String {
        let scheme = if self.config.use_tls { "https" } else { "http" };
        format!("{}://{}{}", scheme, host, path)
    }

    fn build_db_url_on(&self, host: &str, path: &str) -> String {
        self.build_url_on(host, &format!("/_db/{}{}", self.config.database, path))
    }

    /// Replace the host list with the endpoints the server advertises.
    /// Keeps the configured hosts when the server reports none.
    pub async fn acquire_host_list(&mut self) -> Result<()> {
        let url = self.build_url("/_api/cluster/endpoints");
        let endpoints: ClusterEndpoints = self.send(self.request(Method::GET, &url)).await?;
        let mut hosts: Vec<String> = endpoints
            .endpoints
            .iter()
            .filter_map(|e| e.endpoint.split_once("://").map(|(_, rest)| rest.to_string()))
            .collect();
        hosts.dedup();
        if hosts.is_empty() {
            warn!("server advertised no endpoints; keeping configured hosts");
            return Ok(());
        }
        debug!(?hosts, "acquired host list");
        self.hosts = hosts;
        self.next_host.store(0, Ordering::Relaxed);
        Ok(())
    }

    pub async fn version(&self) -> Result<VersionInfo> {
        let url = self.build_url("/_api/version");
        self.send(self.request(Method::GET, &url)).await
    }

    // --- provisioning ---

    pub async fn database_exists(&self, name: &str) -> Result<bool> {
        let url = self.build_url(&format!("/_db/{}/_api/database/current", name));
        exists(self.send::<Value>(self.request(Method::GET, &url)).await)
    }

    pub async fn create_database(&self, name: &str) -> Result<()> {
        let url = self.build_url("/_api/database");
        let body = DatabaseCreateRequest { name: name.to_string() };
        self.send_discard(self.request(Method::POST, &url).json(&body)).await
    }

    pub async fn drop_database(&self, name: &str) -> Result<()> {
        let url = self.build_url(&format!("/_api/database/{}", name));
        self.send_discard(self.request(Method::DELETE, &url)).await
    }

    pub async fn collection_exists(&self, name: &str) -> Result<bool> {
        let url = self.build_db_url(&format!("/_api/collection/{}", name));
        exists(self.send::<Value>(self.request(Method::GET, &url)).await)
    }

    pub async fn create_collection(&self, request: &CollectionCreateRequest) -> Result<CollectionInfo> {
        let url = self.build_db_url("/_api/collection");
        self.send(self.request(Method::POST, &url).json(request)).await
    }

    pub async fn graph_exists(&self, name: &str) -> Result<bool> {
        let url = self.build_db_url(&format!("/_api/gharial/{}", name));
        exists(self.send::<Value>(self.request(Method::GET, &url)).await)
    }

    pub async fn create_graph(&self, request: &GraphCreateRequest) -> Result<()> {
        let url = self.build_db_url("/_api/gharial");
        self.send_discard(self.request(Method::POST, &url).json(request)).await
    }

    /// Create an index unless an identical one exists; returns the index description.
    pub async fn ensure_index(&self, collection: &str, request: &IndexCreateRequest) -> Result<IndexInfo> {
        let url = self.build_db_url("/_api/index");
        self.send(
            self.request(Method::POST, &url)
                .query(&[("collection", collection)])
                .json(request),
        )
        .await
    }

    pub async fn create_view(&self, request: &ViewCreateRequest) -> Result<()> {
        let url = self.build_db_url("/_api/view");
        self.send_discard(self.request(Method::POST, &url).json(request)).await
    }

    // --- documents ---

    /// Insert one document; returns its meta data (`_id`, `_key`, `_rev`).
    pub async fn insert_document(&self, collection: &str, doc: &Document) -> Result<Document> {
        self.write_collection(WriteMethod::Insert, collection, doc).await
    }

    /// Insert several documents in one request; one outcome per input position.
    pub async fn insert_documents(&self, collection: &str, docs: &[Document]) -> Result<Vec<DocumentOutcome>> {
        self.write_collection(WriteMethod::Insert, collection, docs).await
    }

    /// Fetch one document by key. A missing document is `DocDbError::NotFound`.
    pub async fn get_document(&self, collection: &str, key: &str) -> Result<Document> {
        let url = self.build_db_url(&format!("/_api/document/{}/{}", collection, key));
        self.send(self.request(Method::GET, &url)).await
    }

    /// Fetch several documents by key in one request.
    pub async fn get_documents(&self, collection: &str, keys: &[String]) -> Result<Vec<DocumentOutcome>> {
        let url = self.build_db_url(&format!("/_api/document/{}", collection));
        self.send(
            self.request(Method::PUT, &url)
                .query(&[("onlyget", "true")])
                .json(keys),
        )
        .await
    }

    pub async fn update_document(&self, collection: &str, key: &str, doc: &Document) -> Result<Document> {
        self.write_key(WriteMethod::Update, collection, key, doc).await
    }

    pub async fn update_documents(&self, collection: &str, docs: &[Document]) -> Result<Vec<DocumentOutcome>> {
        self.write_collection(WriteMethod::Update, collection, docs).await
    }

    pub async fn replace_document(&self, collection: &str, key: &str, doc: &Document) -> Result<Document> {
        self.write_key(WriteMethod::Replace, collection, key, doc).await
    }

    pub async fn replace_documents(&self, collection: &str, docs: &[Document]) -> Result<Vec<DocumentOutcome>> {
        self.write_collection(WriteMethod::Replace, collection, docs).await
    }

    /// Bulk-import documents through the import endpoint.
    pub async fn import_documents(&self, collection: &str, docs: &[Document]) -> Result<ImportResult> {
        let url = self.build_db_url("/_api/import");
        self.send(
            self.request(Method::POST, &url)
                .query(&[("collection", collection), ("type", "list")])
                .json(docs),
        )
        .await
    }

    /// Run a query and drain every batch of its cursor.
    /// Continuations go to the host that created the cursor.
    pub async fn query(&self, request: &CursorRequest) -> Result<Vec<Value>> {
        let host = self.host();
        let url = self.build_db_url_on(host, "/_api/cursor");
        let mut page: CursorResponse = self.send(self.request(Method::POST, &url).json(request)).await?;
        let mut result = std::mem::take(&mut page.result);
        while page.has_more {
            let id = page
                .id
                .clone()
                .ok_or_else(|| DocDbError::Decode("cursor has more results but no id".to_string()))?;
            let url = self.build_db_url_on(host, &format!("/_api/cursor/{}", id));
            page = self.send(self.request(Method::PUT, &url)).await?;
            result.append(&mut page.result);
        }
        Ok(result)
    }

    // --- graphs ---

    pub async fn insert_edge(&self, graph: &str, collection: &str, edge: &Document) -> Result<()> {
        let url = self.build_db_url(&format!("/_api/gharial/{}/edge/{}", graph, collection));
        self.send_discard(self.request(Method::POST, &url).json(edge)).await
    }

    pub async fn replace_vertex(&self, graph: &str, collection: &str, key: &str, vertex: &Document) -> Result<()> {
        let url = self.build_db_url(&format!("/_api/gharial/{}/vertex/{}/{}", graph, collection, key));
        self.send_discard(self.request(Method::PUT, &url).json(vertex)).await
    }

    // --- plumbing ---

    async fn write_collection<B, T>(&self, method: WriteMethod, collection: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.build_db_url(&format!("/_api/document/{}", collection));
        self.send(self.request(method.http_method(), &url).json(body)).await
    }

    async fn write_key(&self, method: WriteMethod, collection: &str, key: &str, doc: &Document) -> Result<Document> {
        let url = self.build_db_url(&format!("/_api/document/{}/{}", collection, key));
        self.send(self.request(method.http_method(), &url).json(doc)).await
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self.http_client.request(method, url);
        match &self.config.credentials {
            Some(c) => request.basic_auth(&c.user, c.password.as_deref()),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| DocDbError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(parse_error_response(status, response).await);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DocDbError::Decode(e.to_string()))
    }

    async fn send_discard(&self, request: RequestBuilder) -> Result<()> {
        let response = request
            .send()
            .await
            .map_err(|e| DocDbError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(parse_error_response(status, response).await);
        }
        Ok(())
    }
}

/// Map a lookup result to an existence flag; only `NotFound` means "absent".
fn exists<T>(result: Result<T>) -> Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(DocDbError::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

async fn parse_error_response(status: StatusCode, response: reqwest::Response) -> DocDbError {
    let message = response
        .json::<ErrorResponse>()
        .await
        .map(|r| r.error_message)
        .unwrap_or_else(|_| format!("Server returned status: {}", status));

    match status {
        StatusCode::NOT_FOUND => DocDbError::NotFound(message),
        StatusCode::CONFLICT => DocDbError::Conflict(message),
        StatusCode::BAD_REQUEST => DocDbError::BadRequest(message),
        _ => DocDbError::HttpError(status.as_u16(), message),
    }
}
