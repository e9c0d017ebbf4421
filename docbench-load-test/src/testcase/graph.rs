use crate::document::DocumentCreator;
use crate::error::{BackendError, ConfigurationError};

use super::{Operation, Session};

/// Insert an edge looping on the dummy vertex through the graph API.
pub(crate) struct EdgeInsert {
    session: Session,
    creator: DocumentCreator,
}

impl EdgeInsert {
    pub(crate) fn new(session: Session, creator: DocumentCreator) -> Self {
        Self { session, creator }
    }
}

impl Operation for EdgeInsert {
    fn prepare(&mut self) -> Result<(), ConfigurationError> {
        self.session.next_keys();
        let vertex_collection = &self.session.config.names.vertex_collection;
        self.creator.create_edges(&self.session.keys, vertex_collection);
        Ok(())
    }

    fn execute(&mut self) -> Result<(), BackendError> {
        let names = &self.session.config.names;
        let edge = self
            .creator
            .documents(1)
            .first()
            .ok_or_else(|| BackendError::Runtime("no edge prepared".to_string()))?;
        self.session.backend.insert_edge(&names.graph, &names.edge_collection, edge)
    }

    fn close(&mut self) {
        self.session.close();
    }
}

/// Replace a vertex by key through the graph API.
pub(crate) struct VertexReplace {
    session: Session,
    creator: DocumentCreator,
}

impl VertexReplace {
    pub(crate) fn new(session: Session, creator: DocumentCreator) -> Self {
        Self { session, creator }
    }
}

impl Operation for VertexReplace {
    fn prepare(&mut self) -> Result<(), ConfigurationError> {
        self.session.next_keys();
        self.creator.create(&self.session.keys);
        Ok(())
    }

    fn execute(&mut self) -> Result<(), BackendError> {
        let names = &self.session.config.names;
        let key = self
            .session
            .keys
            .first()
            .ok_or_else(|| BackendError::Runtime("no key prepared".to_string()))?;
        let vertex = self
            .creator
            .documents(1)
            .first()
            .ok_or_else(|| BackendError::Runtime("no vertex prepared".to_string()))?;
        self.session
            .backend
            .replace_vertex(&names.graph, &names.vertex_collection, key, vertex)
    }

    fn close(&mut self) {
        self.session.close();
    }
}
