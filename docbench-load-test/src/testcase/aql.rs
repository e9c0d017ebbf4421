use serde_json::{Map, Value};

use crate::backend::QueryRequest;
use crate::document::DocumentCreator;
use crate::error::{BackendError, ConfigurationError};

use super::{expect_all, Operation, Session};

pub const READ_ONE_QUERY: &str = "FOR i IN @@collection FILTER i._key == @key LIMIT 1 RETURN i";
pub const READ_MANY_QUERY: &str = "FOR i IN @@collection FILTER i._key IN @keys RETURN i";
pub const REPLACE_ONE_QUERY: &str = "REPLACE @doc IN @@collection";
pub const REPLACE_MANY_QUERY: &str = "FOR i IN @docs REPLACE i IN @@collection";

fn query_request(session: &Session, query: &str, bind_vars: Map<String, Value>) -> QueryRequest {
    QueryRequest {
        query: query.to_string(),
        bind_vars,
        batch_size: session.config.query.cursor_batch_size,
        stream: session.config.query.cursor_stream,
    }
}

fn keys_value(keys: &[String]) -> Value {
    Value::Array(keys.iter().cloned().map(Value::String).collect())
}

/// Read documents by key through a query.
pub(crate) struct AqlRead {
    session: Session,
}

impl AqlRead {
    pub(crate) fn new(session: Session) -> Self {
        Self { session }
    }
}

impl Operation for AqlRead {
    fn prepare(&mut self) -> Result<(), ConfigurationError> {
        self.session.next_keys();
        Ok(())
    }

    fn execute(&mut self) -> Result<(), BackendError> {
        let session = &mut self.session;
        let mut bind_vars = Map::new();
        bind_vars.insert("@collection".to_string(), Value::String(session.config.names.collection.clone()));
        let query = if session.keys.len() == 1 {
            bind_vars.insert("key".to_string(), Value::String(session.first_key()?.to_string()));
            READ_ONE_QUERY
        } else {
            bind_vars.insert("keys".to_string(), keys_value(&session.keys));
            READ_MANY_QUERY
        };
        let request = query_request(session, query, bind_vars);
        let result = session.backend.query(&request)?;
        if session.keys.len() == 1 && result.is_empty() {
            return Err(BackendError::MissingDocument(session.first_key()?.to_string()));
        }
        expect_all("read", result.len(), session.keys.len())
    }

    fn close(&mut self) {
        self.session.close();
    }
}

/// Replace documents through a query.
pub(crate) struct AqlReplace {
    session: Session,
    creator: DocumentCreator,
}

impl AqlReplace {
    pub(crate) fn new(session: Session, creator: DocumentCreator) -> Self {
        Self { session, creator }
    }
}

impl Operation for AqlReplace {
    fn prepare(&mut self) -> Result<(), ConfigurationError> {
        self.session.next_keys();
        self.creator.create(&self.session.keys);
        Ok(())
    }

    fn execute(&mut self) -> Result<(), BackendError> {
        let docs = self.creator.documents(self.session.batch_size());
        let mut bind_vars = Map::new();
        bind_vars.insert("@collection".to_string(), Value::String(self.session.config.names.collection.clone()));
        let query = match docs {
            [doc] => {
                bind_vars.insert("doc".to_string(), Value::Object(doc.clone()));
                REPLACE_ONE_QUERY
            }
            _ => {
                let docs = docs.iter().cloned().map(Value::Object).collect();
                bind_vars.insert("docs".to_string(), Value::Array(docs));
                REPLACE_MANY_QUERY
            }
        };
        let request = query_request(&self.session, query, bind_vars);
        self.session.backend.query(&request).map(|_| ())
    }

    fn close(&mut self) {
        self.session.close();
    }
}

/// Run a user supplied query, binding only the parameters it mentions.
pub(crate) struct AqlCustom {
    session: Session,
    creator: DocumentCreator,
}

impl AqlCustom {
    pub(crate) fn new(session: Session, creator: DocumentCreator) -> Self {
        Self { session, creator }
    }

    fn bind_vars(&self, query: &str) -> Map<String, Value> {
        let names = &self.session.config.names;
        let docs = self.creator.documents(self.session.batch_size());
        let keys = &self.session.keys;
        let mut bind_vars = Map::new();
        if query.contains("@graph") {
            bind_vars.insert("graph".to_string(), Value::String(names.graph.clone()));
        }
        if query.contains("@@collection") {
            bind_vars.insert("@collection".to_string(), Value::String(names.collection.clone()));
        }
        if query.contains("@@edge") {
            bind_vars.insert("@edge".to_string(), Value::String(names.edge_collection.clone()));
        }
        if query.contains("@@vertex") {
            bind_vars.insert("@vertex".to_string(), Value::String(names.vertex_collection.clone()));
        }
        if query.contains("@docs") {
            bind_vars.insert("docs".to_string(), Value::Array(docs.iter().cloned().map(Value::Object).collect()));
        } else if query.contains("@doc") {
            if let Some(doc) = docs.first() {
                bind_vars.insert("doc".to_string(), Value::Object(doc.clone()));
            }
        }
        if query.contains("@keys") {
            bind_vars.insert("keys".to_string(), keys_value(keys));
        } else if query.contains("@key") {
            if let Some(key) = keys.first() {
                bind_vars.insert("key".to_string(), Value::String(key.clone()));
            }
        }
        bind_vars
    }
}

impl Operation for AqlCustom {
    fn prepare(&mut self) -> Result<(), ConfigurationError> {
        if self.session.config.query.custom_query.as_deref().map_or(true, |q| q.trim().is_empty()) {
            return Err(ConfigurationError::MissingQuery);
        }
        self.session.next_keys();
        self.creator.create(&self.session.keys);
        Ok(())
    }

    fn execute(&mut self) -> Result<(), BackendError> {
        let query = self.session.config.query.custom_query.clone().unwrap_or_default();
        let request = query_request(&self.session, &query, self.bind_vars(&query));
        self.session.backend.query(&request).map(|_| ())
    }

    fn close(&mut self) {
        self.session.close();
    }
}
