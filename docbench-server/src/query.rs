//! Cursor evaluation for the mock server.
//!
//! There is no query parser. A request is classified by the bind parameters it
//! carries and the write keyword in its text: documents bound as `@doc`/`@docs`
//! are written, keys bound as `@key`/`@keys` are looked up, and anything else
//! yields an empty result.

use docbench_common::{document_key, CursorRequest, Document};
use serde_json::Value;

use crate::store::{ApiError, ApiResult, Database};

/// Collection bind parameters, in the order they are consulted.
const COLLECTION_BINDS: [&str; 3] = ["@collection", "@vertex", "@edge"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteVerb {
    Insert,
    Update,
    Replace,
}

impl WriteVerb {
    fn detect(query: &str) -> Option<Self> {
        let upper = query.to_ascii_uppercase();
        if upper.contains("REPLACE") {
            Some(WriteVerb::Replace)
        } else if upper.contains("UPDATE") {
            Some(WriteVerb::Update)
        } else if upper.contains("INSERT") {
            Some(WriteVerb::Insert)
        } else {
            None
        }
    }
}

/// Run `request` against `db`, returning the full result set.
pub fn evaluate(db: &mut Database, request: &CursorRequest) -> ApiResult<Vec<Value>> {
    if let Some(docs) = bound_documents(request)? {
        let Some(verb) = WriteVerb::detect(&request.query) else {
            return Ok(docs.into_iter().map(Value::Object).collect());
        };
        let collection = db.collection_mut(bound_collection(request)?)?;
        for doc in docs {
            match verb {
                WriteVerb::Insert => {
                    collection.insert(doc)?;
                }
                WriteVerb::Update | WriteVerb::Replace => {
                    let key = document_key(&doc)
                        .map(str::to_string)
                        .ok_or_else(|| ApiError::bad_parameter("bound document has no _key"))?;
                    if verb == WriteVerb::Update {
                        collection.update(&key, doc)?;
                    } else {
                        collection.replace(&key, doc)?;
                    }
                }
            }
        }
        return Ok(Vec::new());
    }

    if let Some(keys) = bound_keys(request)? {
        let collection = db.collection(bound_collection(request)?)?;
        return Ok(keys
            .iter()
            .filter_map(|k| collection.documents.get(k).cloned())
            .map(Value::Object)
            .collect());
    }

    Ok(Vec::new())
}

fn bound_collection(request: &CursorRequest) -> ApiResult<&str> {
    COLLECTION_BINDS
        .iter()
        .find_map(|name| request.bind_vars.get(*name).and_then(Value::as_str))
        .ok_or_else(|| ApiError::bad_parameter("no collection bind parameter"))
}

fn bound_documents(request: &CursorRequest) -> ApiResult<Option<Vec<Document>>> {
    let binds = &request.bind_vars;
    let values: Vec<&Value> = match (binds.get("docs"), binds.get("doc")) {
        (Some(Value::Array(items)), _) => items.iter().collect(),
        (Some(_), _) => return Err(ApiError::bad_parameter("@docs must be an array")),
        (None, Some(doc)) => vec![doc],
        (None, None) => return Ok(None),
    };
    values
        .into_iter()
        .map(|v| {
            v.as_object()
                .cloned()
                .ok_or_else(|| ApiError::bad_parameter("bound document must be an object"))
        })
        .collect::<ApiResult<Vec<_>>>()
        .map(Some)
}

fn bound_keys(request: &CursorRequest) -> ApiResult<Option<Vec<String>>> {
    let binds = &request.bind_vars;
    let values: Vec<&Value> = match (binds.get("keys"), binds.get("key")) {
        (Some(Value::Array(items)), _) => items.iter().collect(),
        (Some(_), _) => return Err(ApiError::bad_parameter("@keys must be an array")),
        (None, Some(key)) => vec![key],
        (None, None) => return Ok(None),
    };
    values
        .into_iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| ApiError::bad_parameter("bound key must be a string"))
        })
        .collect::<ApiResult<Vec<_>>>()
        .map(Some)
}
