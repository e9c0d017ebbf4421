use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const KEY_FIELD: &str = "_key";
pub const ID_FIELD: &str = "_id";
pub const REV_FIELD: &str = "_rev";
pub const FROM_FIELD: &str = "_from";
pub const TO_FIELD: &str = "_to";

/// Collection type codes used by the collection API.
pub const DOCUMENT_COLLECTION: u32 = 2;
pub const EDGE_COLLECTION: u32 = 3;

/// Numeric error codes carried in `errorNum`.
pub mod error_num {
    pub const LOCK_TIMEOUT: u32 = 18;
    pub const BAD_PARAMETER: u32 = 600;
    pub const DOCUMENT_NOT_FOUND: u32 = 1202;
    pub const COLLECTION_NOT_FOUND: u32 = 1203;
    pub const DUPLICATE_NAME: u32 = 1207;
    pub const UNIQUE_CONSTRAINT_VIOLATED: u32 = 1210;
    pub const DOCUMENT_KEY_BAD: u32 = 1221;
    pub const DATABASE_NOT_FOUND: u32 = 1228;
    pub const CURSOR_NOT_FOUND: u32 = 1600;
    pub const GRAPH_NOT_FOUND: u32 = 1924;
}

/// A JSON document. System attributes (`_key`, `_from`, ...) live alongside user fields.
pub type Document = Map<String, Value>;

/// The `_key` of `doc`, if present and a string.
pub fn document_key(doc: &Document) -> Option<&str> {
    doc.get(KEY_FIELD).and_then(Value::as_str)
}

/// Error types for document database operations
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocDbError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("HTTP {0}: {1}")]
    HttpError(u16, String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Malformed response: {0}")]
    Decode(String),
}

/// JSON error envelope returned by the server for all error responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: bool,
    pub code: u16,
    #[serde(rename = "errorNum")]
    pub error_num: u32,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
}

impl ErrorResponse {
    pub fn new(code: u16, error_num: u32, message: impl Into<String>) -> Self {
        Self { error: true, code, error_num, error_message: message.into() }
    }
}

/// Per-element error inside a multi-document response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub error: bool,
    #[serde(rename = "errorNum")]
    pub error_num: u32,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
}

impl ErrorEntry {
    pub fn new(error_num: u32, message: impl Into<String>) -> Self {
        Self { error: true, error_num, error_message: message.into() }
    }
}

/// One element of a multi-document response: either the document (or its
/// meta data) or the error reported for that position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentOutcome {
    Failed(ErrorEntry),
    Ok(Document),
}

impl DocumentOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, DocumentOutcome::Ok(_))
    }
}

/// Response body of the bulk import endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub errors: u64,
    #[serde(default)]
    pub empty: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub ignored: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorOptions {
    #[serde(default)]
    pub stream: bool,
}

/// Body of `POST /_api/cursor`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CursorRequest {
    pub query: String,
    #[serde(rename = "bindVars", default, skip_serializing_if = "Map::is_empty")]
    pub bind_vars: Map<String, Value>,
    #[serde(rename = "batchSize", default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(default)]
    pub options: CursorOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CursorResponse {
    pub result: Vec<Value>,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub server: String,
    pub version: String,
    #[serde(default)]
    pub license: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseCreateRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionCreateRequest {
    pub name: String,
    #[serde(rename = "type", default = "default_collection_type")]
    pub collection_type: u32,
    #[serde(default = "one")]
    pub number_of_shards: u32,
    #[serde(default = "one")]
    pub replication_factor: u32,
    #[serde(default)]
    pub wait_for_sync: bool,
}

fn default_collection_type() -> u32 {
    DOCUMENT_COLLECTION
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub collection_type: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub collection: String,
    pub from: Vec<String>,
    pub to: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphOptions {
    pub number_of_shards: u32,
    pub replication_factor: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphCreateRequest {
    pub name: String,
    pub edge_definitions: Vec<EdgeDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<GraphOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexCreateRequest {
    #[serde(rename = "type")]
    pub index_type: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub index_type: String,
    pub fields: Vec<String>,
    #[serde(rename = "isNewlyCreated", default)]
    pub is_newly_created: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewCreateRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub view_type: String,
    #[serde(default)]
    pub links: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEndpoint {
    pub endpoint: String,
}

/// Response body of `GET /_api/cluster/endpoints`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEndpoints {
    pub endpoints: Vec<ClusterEndpoint>,
}

/// Result type for document database operations
pub type Result<T> = std::result::Result<T, DocDbError>;
