//! In-memory data model behind the HTTP handlers.
//!
//! Everything here is synchronous and lock-free; callers hold the `DbState`
//! write lock for the duration of an operation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use docbench_common::{
    document_key, error_num, Document, EdgeDefinition, ErrorResponse, IndexInfo, ID_FIELD, KEY_FIELD, REV_FIELD,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use crate::config::{MAX_KEY_LENGTH, SYSTEM_DATABASE};

/// An error reported to clients through the standard error envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_num: u32,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error_num: u32, message: impl Into<String>) -> Self {
        Self { status, error_num, message: message.into() }
    }

    pub fn bad_parameter(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_num::BAD_PARAMETER, message)
    }

    pub fn document_not_found(collection: &str, key: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            error_num::DOCUMENT_NOT_FOUND,
            format!("document not found: {}/{}", collection, key),
        )
    }

    pub fn collection_not_found(name: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            error_num::COLLECTION_NOT_FOUND,
            format!("collection or view not found: {}", name),
        )
    }

    pub fn database_not_found(name: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, error_num::DATABASE_NOT_FOUND, format!("database not found: {}", name))
    }

    pub fn graph_not_found(name: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, error_num::GRAPH_NOT_FOUND, format!("graph '{}' not found", name))
    }

    pub fn duplicate_name(name: &str) -> Self {
        Self::new(StatusCode::CONFLICT, error_num::DUPLICATE_NAME, format!("duplicate name: {}", name))
    }

    pub fn unique_constraint(collection: &str, key: &str) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            error_num::UNIQUE_CONSTRAINT_VIOLATED,
            format!("unique constraint violated - in index primary of type primary over '_key'; conflicting key: {} in {}", key, collection),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        debug!(status = %self.status, error_num = self.error_num, message = %self.message, "request failed");
        let body = ErrorResponse::new(self.status.as_u16(), self.error_num, self.message);
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

pub struct Collection {
    pub name: String,
    pub collection_type: u32,
    pub documents: HashMap<String, Document>,
    pub indexes: Vec<IndexInfo>,
    tick: u64,
}

impl Collection {
    pub fn new(name: &str, collection_type: u32) -> Self {
        Self {
            name: name.to_string(),
            collection_type,
            documents: HashMap::new(),
            indexes: Vec::new(),
            tick: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    pub fn get(&self, key: &str) -> ApiResult<&Document> {
        self.documents
            .get(key)
            .ok_or_else(|| ApiError::document_not_found(&self.name, key))
    }

    /// Store a new document. A missing `_key` is generated; an existing key is a conflict.
    pub fn insert(&mut self, mut doc: Document) -> ApiResult<Document> {
        let tick = self.next_tick();
        let key = match document_key(&doc) {
            Some(k) => k.to_string(),
            None if doc.contains_key(KEY_FIELD) => {
                return Err(ApiError::new(StatusCode::BAD_REQUEST, error_num::DOCUMENT_KEY_BAD, "illegal document key"))
            }
            None => tick.to_string(),
        };
        validate_key(&key)?;
        if self.documents.contains_key(&key) {
            return Err(ApiError::unique_constraint(&self.name, &key));
        }
        self.stamp(&mut doc, &key, tick);
        let meta = meta_of(&doc);
        self.documents.insert(key, doc);
        Ok(meta)
    }

    /// Merge the top-level attributes of `patch` into the stored document.
    pub fn update(&mut self, key: &str, patch: Document) -> ApiResult<Document> {
        let tick = self.next_tick();
        let name = self.name.clone();
        let stored = self
            .documents
            .get_mut(key)
            .ok_or_else(|| ApiError::document_not_found(&name, key))?;
        for (field, value) in patch {
            if !field.starts_with('_') {
                stored.insert(field, value);
            }
        }
        stored.insert(REV_FIELD.to_string(), Value::String(format!("_{}", tick)));
        Ok(meta_of(stored))
    }

    /// Swap the stored document for `doc`, keeping its system attributes.
    pub fn replace(&mut self, key: &str, mut doc: Document) -> ApiResult<Document> {
        if !self.documents.contains_key(key) {
            return Err(ApiError::document_not_found(&self.name, key));
        }
        let tick = self.next_tick();
        self.stamp(&mut doc, key, tick);
        let meta = meta_of(&doc);
        self.documents.insert(key.to_string(), doc);
        Ok(meta)
    }

    /// Register an index; an identical existing index is returned unchanged.
    pub fn ensure_index(&mut self, index_type: &str, fields: Vec<String>) -> ApiResult<IndexInfo> {
        if !matches!(index_type, "hash" | "skiplist" | "persistent" | "geo" | "fulltext") {
            return Err(ApiError::bad_parameter(format!("invalid index type: {}", index_type)));
        }
        if fields.is_empty() {
            return Err(ApiError::bad_parameter("index needs at least one field"));
        }
        if let Some(existing) = self
            .indexes
            .iter()
            .find(|i| i.index_type == index_type && i.fields == fields)
        {
            return Ok(IndexInfo { is_newly_created: false, ..existing.clone() });
        }
        let id = format!("{}/{}", self.name, self.indexes.len() + 1);
        let index = IndexInfo { id, index_type: index_type.to_string(), fields, is_newly_created: true };
        self.indexes.push(index.clone());
        Ok(index)
    }

    fn stamp(&self, doc: &mut Document, key: &str, tick: u64) {
        doc.insert(KEY_FIELD.to_string(), Value::String(key.to_string()));
        doc.insert(ID_FIELD.to_string(), Value::String(format!("{}/{}", self.name, key)));
        doc.insert(REV_FIELD.to_string(), Value::String(format!("_{}", tick)));
    }
}

fn validate_key(key: &str) -> ApiResult<()> {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH || key.contains('/') {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            error_num::DOCUMENT_KEY_BAD,
            format!("illegal document key: {}", key),
        ));
    }
    Ok(())
}

/// `_id`, `_key` and `_rev` of a stored document.
pub fn meta_of(doc: &Document) -> Document {
    [ID_FIELD, KEY_FIELD, REV_FIELD]
        .iter()
        .filter_map(|f| doc.get(*f).map(|v| (f.to_string(), v.clone())))
        .collect()
}

pub struct Graph {
    pub name: String,
    pub edge_definitions: Vec<EdgeDefinition>,
}

impl Graph {
    pub fn has_edge_collection(&self, collection: &str) -> bool {
        self.edge_definitions.iter().any(|d| d.collection == collection)
    }

    pub fn has_vertex_collection(&self, collection: &str) -> bool {
        self.edge_definitions
            .iter()
            .any(|d| d.from.iter().chain(d.to.iter()).any(|c| c == collection))
    }
}

/// Query results not yet handed out, fetched batch by batch.
pub struct Cursor {
    pub remaining: VecDeque<Value>,
    pub batch_size: usize,
}

#[derive(Default)]
pub struct Database {
    pub collections: HashMap<String, Collection>,
    pub graphs: HashMap<String, Graph>,
    pub views: HashSet<String>,
    pub cursors: HashMap<String, Cursor>,
    next_cursor: u64,
}

impl Database {
    pub fn collection(&self, name: &str) -> ApiResult<&Collection> {
        self.collections
            .get(name)
            .ok_or_else(|| ApiError::collection_not_found(name))
    }

    pub fn collection_mut(&mut self, name: &str) -> ApiResult<&mut Collection> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| ApiError::collection_not_found(name))
    }

    pub fn graph(&self, name: &str) -> ApiResult<&Graph> {
        self.graphs.get(name).ok_or_else(|| ApiError::graph_not_found(name))
    }

    pub fn create_collection(&mut self, name: &str, collection_type: u32) -> ApiResult<&Collection> {
        if name.is_empty() {
            return Err(ApiError::bad_parameter("collection name must not be empty"));
        }
        if self.collections.contains_key(name) {
            return Err(ApiError::duplicate_name(name));
        }
        let collection = self
            .collections
            .entry(name.to_string())
            .or_insert_with(|| Collection::new(name, collection_type));
        Ok(collection)
    }

    /// Create a collection unless one with that name exists already.
    pub fn ensure_collection(&mut self, name: &str, collection_type: u32) {
        self.collections
            .entry(name.to_string())
            .or_insert_with(|| Collection::new(name, collection_type));
    }

    /// Whether the vertex addressed by a `collection/key` handle exists.
    pub fn vertex_exists(&self, handle: &str) -> bool {
        handle
            .split_once('/')
            .and_then(|(c, k)| self.collections.get(c).map(|coll| coll.documents.contains_key(k)))
            .unwrap_or(false)
    }

    /// Keep `results` beyond the first batch as a cursor; returns the first batch,
    /// whether more is pending, and the cursor id if so.
    pub fn open_cursor(&mut self, results: Vec<Value>, batch_size: usize) -> (Vec<Value>, bool, Option<String>) {
        let batch_size = batch_size.max(1);
        let mut remaining: VecDeque<Value> = results.into();
        let first: Vec<Value> = remaining.drain(..batch_size.min(remaining.len())).collect();
        if remaining.is_empty() {
            return (first, false, None);
        }
        self.next_cursor += 1;
        let id = self.next_cursor.to_string();
        self.cursors.insert(id.clone(), Cursor { remaining, batch_size });
        (first, true, Some(id))
    }

    /// Hand out the next batch of cursor `id`; an exhausted cursor is removed.
    pub fn advance_cursor(&mut self, id: &str) -> ApiResult<(Vec<Value>, bool)> {
        let cursor = self.cursors.get_mut(id).ok_or_else(|| {
            ApiError::new(StatusCode::NOT_FOUND, error_num::CURSOR_NOT_FOUND, format!("cursor not found: {}", id))
        })?;
        let take = cursor.batch_size.min(cursor.remaining.len());
        let batch: Vec<Value> = cursor.remaining.drain(..take).collect();
        let has_more = !cursor.remaining.is_empty();
        if !has_more {
            self.cursors.remove(id);
        }
        Ok((batch, has_more))
    }
}

pub struct DbState {
    pub databases: HashMap<String, Database>,
}

impl Default for DbState {
    fn default() -> Self {
        let mut databases = HashMap::new();
        databases.insert(SYSTEM_DATABASE.to_string(), Database::default());
        Self { databases }
    }
}

impl DbState {
    pub fn database(&self, name: &str) -> ApiResult<&Database> {
        self.databases.get(name).ok_or_else(|| ApiError::database_not_found(name))
    }

    pub fn database_mut(&mut self, name: &str) -> ApiResult<&mut Database> {
        self.databases
            .get_mut(name)
            .ok_or_else(|| ApiError::database_not_found(name))
    }

    pub fn create_database(&mut self, name: &str) -> ApiResult<()> {
        if name.is_empty() {
            return Err(ApiError::bad_parameter("database name must not be empty"));
        }
        if self.databases.contains_key(name) {
            return Err(ApiError::duplicate_name(name));
        }
        self.databases.insert(name.to_string(), Database::default());
        Ok(())
    }

    pub fn drop_database(&mut self, name: &str) -> ApiResult<()> {
        if name == SYSTEM_DATABASE {
            return Err(ApiError::bad_parameter("cannot drop the system database"));
        }
        self.databases
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ApiError::database_not_found(name))
    }
}
