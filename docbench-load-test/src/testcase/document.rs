use crate::backend::WriteKind;
use crate::document::DocumentCreator;
use crate::error::{BackendError, ConfigurationError};

use super::{expect_all, Operation, Session};

pub(crate) struct VersionCheck {
    session: Session,
}

impl VersionCheck {
    pub(crate) fn new(session: Session) -> Self {
        Self { session }
    }
}

impl Operation for VersionCheck {
    fn prepare(&mut self) -> Result<(), ConfigurationError> {
        Ok(())
    }

    fn execute(&mut self) -> Result<(), BackendError> {
        self.session.backend.version()
    }

    fn close(&mut self) {
        self.session.close();
    }
}

/// Insert, update or replace a batch of fresh documents.
pub(crate) struct DocumentWrite {
    session: Session,
    kind: WriteKind,
    creator: DocumentCreator,
}

impl DocumentWrite {
    pub(crate) fn new(session: Session, kind: WriteKind, creator: DocumentCreator) -> Self {
        Self { session, kind, creator }
    }

    fn verb(&self) -> &'static str {
        match self.kind {
            WriteKind::Insert => "inserted",
            WriteKind::Update => "updated",
            WriteKind::Replace => "replaced",
        }
    }
}

impl Operation for DocumentWrite {
    fn prepare(&mut self) -> Result<(), ConfigurationError> {
        self.session.next_keys();
        self.creator.create(&self.session.keys);
        Ok(())
    }

    fn execute(&mut self) -> Result<(), BackendError> {
        let requested = self.session.batch_size();
        let docs = self.creator.documents(requested);
        let collection = &self.session.config.names.collection;
        let outcome = self.session.backend.write_documents(self.kind, collection, docs)?;
        if let Some(message) = &outcome.first_error {
            tracing::debug!(error = %message, "document rejected");
        }
        expect_all(self.verb(), outcome.succeeded, requested)
    }

    fn close(&mut self) {
        self.session.close();
    }
}

/// Read back documents by key, one at a time or as a batch.
pub(crate) struct DocumentRead {
    session: Session,
}

impl DocumentRead {
    pub(crate) fn new(session: Session) -> Self {
        Self { session }
    }
}

impl Operation for DocumentRead {
    fn prepare(&mut self) -> Result<(), ConfigurationError> {
        self.session.next_keys();
        Ok(())
    }

    fn execute(&mut self) -> Result<(), BackendError> {
        let session = &mut self.session;
        let docs = session
            .backend
            .read_documents(&session.config.names.collection, &session.keys)?;
        if session.keys.len() == 1 && docs.is_empty() {
            return Err(BackendError::MissingDocument(session.first_key()?.to_string()));
        }
        expect_all("read", docs.len(), session.keys.len())
    }

    fn close(&mut self) {
        self.session.close();
    }
}

pub(crate) struct DocumentImport {
    session: Session,
    creator: DocumentCreator,
}

impl DocumentImport {
    pub(crate) fn new(session: Session, creator: DocumentCreator) -> Self {
        Self { session, creator }
    }
}

impl Operation for DocumentImport {
    fn prepare(&mut self) -> Result<(), ConfigurationError> {
        self.session.next_keys();
        self.creator.create(&self.session.keys);
        Ok(())
    }

    fn execute(&mut self) -> Result<(), BackendError> {
        let requested = self.session.batch_size();
        let docs = self.creator.documents(requested);
        let outcome = self
            .session
            .backend
            .import_documents(&self.session.config.names.collection, docs)?;
        expect_all("imported", outcome.succeeded, requested)
    }

    fn close(&mut self) {
        self.session.close();
    }
}
