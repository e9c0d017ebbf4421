use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use docbench_common::{
    document_key, error_num, ClusterEndpoint, ClusterEndpoints, CollectionCreateRequest, CollectionInfo,
    CursorRequest, CursorResponse, DatabaseCreateRequest, Document, DocumentOutcome, ErrorEntry,
    GraphCreateRequest, ImportResult, IndexCreateRequest, VersionInfo, ViewCreateRequest, DOCUMENT_COLLECTION,
    EDGE_COLLECTION, FROM_FIELD, TO_FIELD,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::time::timeout;
use tracing::{debug, info};

pub mod config;
pub mod query;
pub mod store;

use config::{DEFAULT_BATCH_SIZE, LOCK_TIMEOUT, MAX_BODY_SIZE, SERVER_NAME};
use store::{ApiError, ApiResult, Collection, DbState, Graph};

pub type Db = Arc<RwLock<DbState>>;

#[derive(Clone, Default)]
pub struct AppState {
    pub db: Db,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
}

/// In-memory document server speaking the subset of the document API the harness uses.
pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn address(&self) -> SocketAddr {
        self.config.address
    }

    /// Create the application router with the given state
    pub fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/_api/version", get(handle_version))
            .route("/_api/cluster/endpoints", get(handle_cluster_endpoints))
            .route("/_api/database", post(handle_create_database))
            .route("/_api/database/:name", axum::routing::delete(handle_drop_database))
            .route("/_db/:db/_api/database/current", get(handle_current_database))
            .route("/_db/:db/_api/collection", post(handle_create_collection))
            .route("/_db/:db/_api/collection/:name", get(handle_get_collection))
            .route(
                "/_db/:db/_api/document/:collection",
                post(handle_insert_documents)
                    .put(handle_replace_documents)
                    .patch(handle_update_documents),
            )
            .route(
                "/_db/:db/_api/document/:collection/:key",
                get(handle_get_document)
                    .put(handle_replace_document)
                    .patch(handle_update_document),
            )
            .route("/_db/:db/_api/import", post(handle_import))
            .route("/_db/:db/_api/cursor", post(handle_create_cursor))
            .route("/_db/:db/_api/cursor/:id", put(handle_next_batch))
            .route("/_db/:db/_api/gharial", post(handle_create_graph))
            .route("/_db/:db/_api/gharial/:graph", get(handle_get_graph))
            .route("/_db/:db/_api/gharial/:graph/edge/:collection", post(handle_insert_edge))
            .route("/_db/:db/_api/gharial/:graph/vertex/:collection/:key", put(handle_replace_vertex))
            .route("/_db/:db/_api/index", post(handle_create_index))
            .route("/_db/:db/_api/view", post(handle_create_view))
            .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
            .with_state(state)
    }

    /// Run the server, signalling `ready_tx` with the bound address once accepting connections
    pub async fn run(self, ready_tx: tokio::sync::oneshot::Sender<SocketAddr>) -> Result<(), Box<dyn std::error::Error>> {
        let app = Self::create_router(AppState::new());
        let listener = tokio::net::TcpListener::bind(self.config.address).await?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "document server listening");
        ready_tx.send(local_addr).ok();
        axum::serve(listener, app).await?;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DocumentParams {
    #[serde(default)]
    pub onlyget: bool,
}

#[derive(Debug, Deserialize)]
pub struct ImportParams {
    pub collection: String,
    #[serde(rename = "type")]
    pub import_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IndexParams {
    pub collection: String,
}

fn lock_timeout() -> ApiError {
    ApiError::new(
        StatusCode::SERVICE_UNAVAILABLE,
        error_num::LOCK_TIMEOUT,
        "Server error: Lock acquisition timed out",
    )
}

async fn read_db(state: &AppState) -> ApiResult<RwLockReadGuard<'_, DbState>> {
    timeout(LOCK_TIMEOUT, state.db.read()).await.map_err(|_| lock_timeout())
}

async fn write_db(state: &AppState) -> ApiResult<RwLockWriteGuard<'_, DbState>> {
    timeout(LOCK_TIMEOUT, state.db.write()).await.map_err(|_| lock_timeout())
}

/// Array responses report per-element errors in place instead of failing the request.
fn outcome(result: ApiResult<Document>) -> DocumentOutcome {
    match result {
        Ok(meta) => DocumentOutcome::Ok(meta),
        Err(e) => DocumentOutcome::Failed(ErrorEntry::new(e.error_num, e.message)),
    }
}

fn as_document(value: Value) -> ApiResult<Document> {
    match value {
        Value::Object(doc) => Ok(doc),
        _ => Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            error_num::DOCUMENT_KEY_BAD,
            "expecting a JSON object",
        )),
    }
}

fn as_array(value: Value) -> ApiResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(ApiError::bad_parameter("expecting a JSON array")),
    }
}

/// Apply an update or replace to the document named by the `_key` inside `value`.
fn modify_keyed(
    collection: &mut Collection,
    value: Value,
    apply: fn(&mut Collection, &str, Document) -> ApiResult<Document>,
) -> ApiResult<Document> {
    let doc = as_document(value)?;
    let key = document_key(&doc)
        .map(str::to_string)
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, error_num::DOCUMENT_KEY_BAD, "missing document key"))?;
    apply(collection, &key, doc)
}

/// Handler for GET /_api/version
pub async fn handle_version() -> Json<VersionInfo> {
    Json(VersionInfo {
        server: SERVER_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        license: "community".to_string(),
    })
}

/// Handler for GET /_api/cluster/endpoints. A single server reports the address it was reached on.
pub async fn handle_cluster_endpoints(headers: HeaderMap) -> ApiResult<Json<ClusterEndpoints>> {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_parameter("missing Host header"))?;
    Ok(Json(ClusterEndpoints {
        endpoints: vec![ClusterEndpoint { endpoint: format!("tcp://{}", host) }],
    }))
}

/// Handler for POST /_api/database
pub async fn handle_create_database(
    State(state): State<AppState>,
    Json(request): Json<DatabaseCreateRequest>,
) -> ApiResult<Response> {
    write_db(&state).await?.create_database(&request.name)?;
    debug!(database = %request.name, "database created");
    Ok((StatusCode::CREATED, Json(json!({ "error": false, "code": 201, "result": true }))).into_response())
}

/// Handler for DELETE /_api/database/:name
pub async fn handle_drop_database(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Response> {
    write_db(&state).await?.drop_database(&name)?;
    debug!(database = %name, "database dropped");
    Ok(Json(json!({ "error": false, "code": 200, "result": true })).into_response())
}

/// Handler for GET /_db/:db/_api/database/current
pub async fn handle_current_database(State(state): State<AppState>, Path(db): Path<String>) -> ApiResult<Response> {
    read_db(&state).await?.database(&db)?;
    Ok(Json(json!({ "error": false, "code": 200, "result": { "name": db } })).into_response())
}

/// Handler for POST /_db/:db/_api/collection
pub async fn handle_create_collection(
    State(state): State<AppState>,
    Path(db): Path<String>,
    Json(request): Json<CollectionCreateRequest>,
) -> ApiResult<Json<CollectionInfo>> {
    if request.collection_type != DOCUMENT_COLLECTION && request.collection_type != EDGE_COLLECTION {
        return Err(ApiError::bad_parameter(format!("invalid collection type: {}", request.collection_type)));
    }
    let mut guard = write_db(&state).await?;
    let collection = guard
        .database_mut(&db)?
        .create_collection(&request.name, request.collection_type)?;
    debug!(collection = %request.name, shards = request.number_of_shards, "collection created");
    Ok(Json(CollectionInfo { name: collection.name.clone(), collection_type: collection.collection_type }))
}

/// Handler for GET /_db/:db/_api/collection/:name
pub async fn handle_get_collection(
    State(state): State<AppState>,
    Path((db, name)): Path<(String, String)>,
) -> ApiResult<Json<CollectionInfo>> {
    let guard = read_db(&state).await?;
    let collection = guard.database(&db)?.collection(&name)?;
    Ok(Json(CollectionInfo { name: collection.name.clone(), collection_type: collection.collection_type }))
}

/// Handler for POST /_db/:db/_api/document/:collection. An object inserts one
/// document; an array inserts each element and reports per-element outcomes.
pub async fn handle_insert_documents(
    State(state): State<AppState>,
    Path((db, collection)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> ApiResult<Response> {
    let mut guard = write_db(&state).await?;
    let collection = guard.database_mut(&db)?.collection_mut(&collection)?;
    match body {
        Value::Array(items) => {
            let outcomes: Vec<DocumentOutcome> = items
                .into_iter()
                .map(|item| outcome(as_document(item).and_then(|doc| collection.insert(doc))))
                .collect();
            Ok((StatusCode::ACCEPTED, Json(outcomes)).into_response())
        }
        other => {
            let meta = collection.insert(as_document(other)?)?;
            Ok((StatusCode::ACCEPTED, Json(meta)).into_response())
        }
    }
}

/// Handler for PUT /_db/:db/_api/document/:collection. With `onlyget=true` the
/// body is a list of keys to read; otherwise a list of documents to replace.
pub async fn handle_replace_documents(
    State(state): State<AppState>,
    Path((db, collection)): Path<(String, String)>,
    Query(params): Query<DocumentParams>,
    Json(body): Json<Value>,
) -> ApiResult<Response> {
    let items = as_array(body)?;
    if params.onlyget {
        let guard = read_db(&state).await?;
        let collection = guard.database(&db)?.collection(&collection)?;
        let outcomes: Vec<DocumentOutcome> = items
            .iter()
            .map(|item| {
                let key = match item {
                    Value::String(k) => Some(k.as_str()),
                    Value::Object(doc) => document_key(doc),
                    _ => None,
                };
                outcome(
                    key.ok_or_else(|| ApiError::bad_parameter("expecting a key"))
                        .and_then(|k| collection.get(k).cloned()),
                )
            })
            .collect();
        return Ok(Json(outcomes).into_response());
    }

    let mut guard = write_db(&state).await?;
    let collection = guard.database_mut(&db)?.collection_mut(&collection)?;
    let outcomes: Vec<DocumentOutcome> = items
        .into_iter()
        .map(|item| outcome(modify_keyed(collection, item, Collection::replace)))
        .collect();
    Ok((StatusCode::ACCEPTED, Json(outcomes)).into_response())
}

/// Handler for PATCH /_db/:db/_api/document/:collection
pub async fn handle_update_documents(
    State(state): State<AppState>,
    Path((db, collection)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> ApiResult<Response> {
    let items = as_array(body)?;
    let mut guard = write_db(&state).await?;
    let collection = guard.database_mut(&db)?.collection_mut(&collection)?;
    let outcomes: Vec<DocumentOutcome> = items
        .into_iter()
        .map(|item| outcome(modify_keyed(collection, item, Collection::update)))
        .collect();
    Ok((StatusCode::ACCEPTED, Json(outcomes)).into_response())
}

/// Handler for GET /_db/:db/_api/document/:collection/:key
pub async fn handle_get_document(
    State(state): State<AppState>,
    Path((db, collection, key)): Path<(String, String, String)>,
) -> ApiResult<Json<Document>> {
    let guard = read_db(&state).await?;
    let doc = guard.database(&db)?.collection(&collection)?.get(&key)?;
    Ok(Json(doc.clone()))
}

/// Handler for PUT /_db/:db/_api/document/:collection/:key
pub async fn handle_replace_document(
    State(state): State<AppState>,
    Path((db, collection, key)): Path<(String, String, String)>,
    Json(doc): Json<Document>,
) -> ApiResult<Response> {
    let mut guard = write_db(&state).await?;
    let meta = guard.database_mut(&db)?.collection_mut(&collection)?.replace(&key, doc)?;
    Ok((StatusCode::ACCEPTED, Json(meta)).into_response())
}

/// Handler for PATCH /_db/:db/_api/document/:collection/:key
pub async fn handle_update_document(
    State(state): State<AppState>,
    Path((db, collection, key)): Path<(String, String, String)>,
    Json(doc): Json<Document>,
) -> ApiResult<Response> {
    let mut guard = write_db(&state).await?;
    let meta = guard.database_mut(&db)?.collection_mut(&collection)?.update(&key, doc)?;
    Ok((StatusCode::ACCEPTED, Json(meta)).into_response())
}

/// Handler for POST /_db/:db/_api/import?collection=..&type=list
pub async fn handle_import(
    State(state): State<AppState>,
    Path(db): Path<String>,
    Query(params): Query<ImportParams>,
    Json(body): Json<Value>,
) -> ApiResult<Response> {
    if let Some(kind) = params.import_type.as_deref() {
        if kind != "list" && kind != "auto" {
            return Err(ApiError::bad_parameter(format!("unsupported import type: {}", kind)));
        }
    }
    let items = as_array(body)?;
    let mut guard = write_db(&state).await?;
    let collection = guard.database_mut(&db)?.collection_mut(&params.collection)?;
    let mut result = ImportResult::default();
    for item in items {
        match as_document(item).and_then(|doc| collection.insert(doc)) {
            Ok(_) => result.created += 1,
            Err(_) => result.errors += 1,
        }
    }
    Ok((StatusCode::CREATED, Json(result)).into_response())
}

/// Handler for POST /_db/:db/_api/cursor
pub async fn handle_create_cursor(
    State(state): State<AppState>,
    Path(db): Path<String>,
    Json(request): Json<CursorRequest>,
) -> ApiResult<Response> {
    let mut guard = write_db(&state).await?;
    let database = guard.database_mut(&db)?;
    let results = query::evaluate(database, &request)?;
    let batch_size = request.batch_size.map(|b| b as usize).unwrap_or(DEFAULT_BATCH_SIZE);
    let (result, has_more, id) = database.open_cursor(results, batch_size);
    Ok((StatusCode::CREATED, Json(CursorResponse { result, has_more, id })).into_response())
}

/// Handler for PUT /_db/:db/_api/cursor/:id
pub async fn handle_next_batch(
    State(state): State<AppState>,
    Path((db, id)): Path<(String, String)>,
) -> ApiResult<Json<CursorResponse>> {
    let mut guard = write_db(&state).await?;
    let (result, has_more) = guard.database_mut(&db)?.advance_cursor(&id)?;
    let id = has_more.then_some(id);
    Ok(Json(CursorResponse { result, has_more, id }))
}

/// Handler for POST /_db/:db/_api/gharial. Collections named by the edge
/// definitions are created when missing.
pub async fn handle_create_graph(
    State(state): State<AppState>,
    Path(db): Path<String>,
    Json(request): Json<GraphCreateRequest>,
) -> ApiResult<Response> {
    let mut guard = write_db(&state).await?;
    let database = guard.database_mut(&db)?;
    if database.graphs.contains_key(&request.name) {
        return Err(ApiError::duplicate_name(&request.name));
    }
    for definition in &request.edge_definitions {
        database.ensure_collection(&definition.collection, EDGE_COLLECTION);
        for vertex in definition.from.iter().chain(definition.to.iter()) {
            database.ensure_collection(vertex, DOCUMENT_COLLECTION);
        }
    }
    database.graphs.insert(
        request.name.clone(),
        Graph { name: request.name.clone(), edge_definitions: request.edge_definitions.clone() },
    );
    debug!(graph = %request.name, "graph created");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "error": false, "code": 202, "graph": { "name": request.name, "edgeDefinitions": request.edge_definitions } })),
    )
        .into_response())
}

/// Handler for GET /_db/:db/_api/gharial/:graph
pub async fn handle_get_graph(
    State(state): State<AppState>,
    Path((db, graph)): Path<(String, String)>,
) -> ApiResult<Response> {
    let guard = read_db(&state).await?;
    let graph = guard.database(&db)?.graph(&graph)?;
    Ok(Json(json!({ "error": false, "code": 200, "graph": { "name": graph.name, "edgeDefinitions": graph.edge_definitions } }))
        .into_response())
}

/// Handler for POST /_db/:db/_api/gharial/:graph/edge/:collection. Both endpoints must exist.
pub async fn handle_insert_edge(
    State(state): State<AppState>,
    Path((db, graph, collection)): Path<(String, String, String)>,
    Json(edge): Json<Document>,
) -> ApiResult<Response> {
    let mut guard = write_db(&state).await?;
    let database = guard.database_mut(&db)?;
    if !database.graph(&graph)?.has_edge_collection(&collection) {
        return Err(ApiError::collection_not_found(&collection));
    }
    for field in [FROM_FIELD, TO_FIELD] {
        let handle = edge
            .get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::bad_parameter(format!("edge attribute missing or invalid: {}", field)))?;
        if !database.vertex_exists(handle) {
            return Err(ApiError::new(
                StatusCode::NOT_FOUND,
                error_num::DOCUMENT_NOT_FOUND,
                format!("referenced _from/_to vertex not found: {}", handle),
            ));
        }
    }
    let meta = database.collection_mut(&collection)?.insert(edge)?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "error": false, "code": 202, "edge": meta }))).into_response())
}

/// Handler for PUT /_db/:db/_api/gharial/:graph/vertex/:collection/:key
pub async fn handle_replace_vertex(
    State(state): State<AppState>,
    Path((db, graph, collection, key)): Path<(String, String, String, String)>,
    Json(vertex): Json<Document>,
) -> ApiResult<Response> {
    let mut guard = write_db(&state).await?;
    let database = guard.database_mut(&db)?;
    if !database.graph(&graph)?.has_vertex_collection(&collection) {
        return Err(ApiError::collection_not_found(&collection));
    }
    let meta = database.collection_mut(&collection)?.replace(&key, vertex)?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "error": false, "code": 202, "vertex": meta }))).into_response())
}

/// Handler for POST /_db/:db/_api/index?collection=... Ensuring an existing index answers 200.
pub async fn handle_create_index(
    State(state): State<AppState>,
    Path(db): Path<String>,
    Query(params): Query<IndexParams>,
    Json(request): Json<IndexCreateRequest>,
) -> ApiResult<Response> {
    let mut guard = write_db(&state).await?;
    let index = guard
        .database_mut(&db)?
        .collection_mut(&params.collection)?
        .ensure_index(&request.index_type, request.fields)?;
    let status = if index.is_newly_created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(index)).into_response())
}

/// Handler for POST /_db/:db/_api/view
pub async fn handle_create_view(
    State(state): State<AppState>,
    Path(db): Path<String>,
    Json(request): Json<ViewCreateRequest>,
) -> ApiResult<Response> {
    if request.view_type != "arangosearch" {
        return Err(ApiError::bad_parameter(format!("unsupported view type: {}", request.view_type)));
    }
    let mut guard = write_db(&state).await?;
    let database = guard.database_mut(&db)?;
    if database.views.contains(&request.name) || database.collections.contains_key(&request.name) {
        return Err(ApiError::duplicate_name(&request.name));
    }
    for linked in request.links.keys() {
        database.collection(linked)?;
    }
    database.views.insert(request.name.clone());
    Ok((
        StatusCode::CREATED,
        Json(json!({ "name": request.name, "type": request.view_type, "links": request.links })),
    )
        .into_response())
}
