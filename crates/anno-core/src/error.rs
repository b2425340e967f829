//! Error taxonomy shared by every layer component.
//!
//! Nothing in this workspace treats an error as fatal: remote failures are
//! surfaced to the user and swallowed, geometry failures reject one
//! operation, and missing reference data is logged as a defect.

use crate::id::{AnnotationId, FeatureKey};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnnoError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnnoError {
    /// Transport or HTTP-level failure reported by a remote collaborator.
    #[error("remote request failed: {}", .messages.join("; "))]
    RemoteRequestFailure {
        /// Human-readable messages from the error payload.
        messages: Vec<String>,
    },

    /// No feature under this key in the local store.
    #[error("feature {0} not found")]
    NotFound(FeatureKey),

    /// The remote store has no annotation with this id.
    #[error("annotation {0} not found")]
    AnnotationNotFound(AnnotationId),

    /// WKT that could not be parsed or a geometry that cannot be encoded.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A user or term expected in the preloaded directories is absent.
    #[error("reference data missing: {kind} {id}")]
    ReferenceDataMissing { kind: &'static str, id: u64 },

    /// A save for this feature is still in flight.
    #[error("feature {0} has a save in flight")]
    Busy(FeatureKey),
}

impl AnnoError {
    /// Remote failure carrying a single message.
    pub fn remote(message: impl Into<String>) -> Self {
        AnnoError::RemoteRequestFailure {
            messages: vec![message.into()],
        }
    }

    /// Text suitable for a toast body.
    pub fn user_message(&self) -> String {
        match self {
            AnnoError::RemoteRequestFailure { messages } => format!("error:{}", messages.join(",")),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_failure_joins_messages() {
        let err = AnnoError::RemoteRequestFailure {
            messages: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "remote request failed: a; b");
        assert_eq!(err.user_message(), "error:a,b");
    }

    #[test]
    fn reference_data_names_kind_and_id() {
        let err = AnnoError::ReferenceDataMissing { kind: "term", id: 9 };
        assert_eq!(err.to_string(), "reference data missing: term 9");
    }
}
