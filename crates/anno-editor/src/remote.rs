//! Remote collaborators: the annotation store and the retrieval service.
//!
//! Both are async and local to the UI thread (`?Send`); implementations
//! own their transport. Every failure is an `AnnoError`, usually
//! `RemoteRequestFailure` built from the response payload with
//! `error_from_payload`.

use anno_core::{
    AnnoError, Annotation, AnnotationDraft, AnnotationId, AnnotationTerm, ImageId, Result,
    RetrievalHit, UserId,
};
use async_trait::async_trait;
use serde::Deserialize;

/// Success acknowledgement with the store's human-readable message.
#[derive(Debug, Clone, PartialEq)]
pub struct Ack {
    pub message: String,
}

/// Answer to an annotation create.
#[derive(Debug, Clone, PartialEq)]
pub struct Created {
    pub annotation: AnnotationId,
    pub message: String,
}

/// Handle of an open transaction scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(pub u64);

#[async_trait(?Send)]
pub trait AnnotationStore {
    /// Open a scope grouping the requests of one logical operation.
    async fn begin_transaction(&self) -> Result<TransactionId>;
    async fn end_transaction(&self, transaction: TransactionId) -> Result<()>;

    async fn create_annotation(&self, draft: &AnnotationDraft) -> Result<Created>;
    async fn fetch_annotation(&self, id: AnnotationId) -> Result<Annotation>;
    /// Every annotation `user` drew on `image`.
    async fn list_annotations(&self, user: UserId, image: ImageId) -> Result<Vec<Annotation>>;
    async fn update_annotation(&self, annotation: &Annotation) -> Result<Ack>;
    async fn delete_annotation(&self, id: AnnotationId) -> Result<Ack>;

    async fn add_annotation_term(&self, link: &AnnotationTerm) -> Result<Ack>;
    async fn annotation_terms(&self, id: AnnotationId) -> Result<Vec<AnnotationTerm>>;
}

#[async_trait(?Send)]
pub trait RetrievalService {
    /// Annotations similar to `annotation`, restricted to the project's
    /// ontology.
    async fn similar(&self, annotation: AnnotationId) -> Result<Vec<RetrievalHit>>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Errors {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
struct ErrorPayload {
    errors: Errors,
}

/// Turn an error response body into a `RemoteRequestFailure`.
///
/// Understands `{"errors": "..."}` and `{"errors": [...]}`; any other body
/// is kept verbatim as the single message.
pub fn error_from_payload(body: &str) -> AnnoError {
    match serde_json::from_str::<ErrorPayload>(body) {
        Ok(ErrorPayload {
            errors: Errors::One(message),
        }) => AnnoError::remote(message),
        Ok(ErrorPayload {
            errors: Errors::Many(messages),
        }) => AnnoError::RemoteRequestFailure { messages },
        Err(_) => AnnoError::remote(body.trim()),
    }
}
