use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Declares a server-assigned numeric identifier.
/// `#[serde(transparent)]` keeps the wire form a bare JSON number.
macro_rules! remote_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

remote_id!(
    /// Identity of a persisted annotation in the remote store.
    AnnotationId,
    "annotation"
);
remote_id!(
    /// An ontology term (classification label).
    TermId,
    "term"
);
remote_id!(ImageId, "image");
remote_id!(UserId, "user");
remote_id!(OntologyId, "ontology");
remote_id!(ProjectId, "project");

/// Process-unique counter shared by every locally minted handle.
fn next_local() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Local identity of a drawn feature, assigned before the remote store
/// knows about it. Never sent over the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(u64);

impl LocalId {
    /// Mint a fresh local id.
    pub fn next() -> Self {
        Self(next_local())
    }
}

impl fmt::Debug for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local#{}", self.0)
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Handle of a popup overlay attached to a feature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PopupHandle(u64);

impl PopupHandle {
    pub fn next() -> Self {
        Self(next_local())
    }
}

impl fmt::Debug for PopupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "popup#{}", self.0)
    }
}

/// Key under which the feature store files a feature.
///
/// Persisted features are keyed by their annotation id; provisional ones
/// (drawn but not yet saved) by their local id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKey {
    Annotation(AnnotationId),
    Local(LocalId),
}

impl FeatureKey {
    pub fn annotation_id(self) -> Option<AnnotationId> {
        match self {
            FeatureKey::Annotation(id) => Some(id),
            FeatureKey::Local(_) => None,
        }
    }
}

impl From<AnnotationId> for FeatureKey {
    fn from(id: AnnotationId) -> Self {
        FeatureKey::Annotation(id)
    }
}

impl fmt::Debug for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureKey::Annotation(id) => write!(f, "{id:?}"),
            FeatureKey::Local(id) => write!(f, "{id:?}"),
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
