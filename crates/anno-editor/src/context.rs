//! Reference data a layer works against.
//!
//! Built once when the layer is created and handed to every component
//! that needs the current project, image, ontology terms or users.

use anno_core::{
    AnnoError, ImageId, OntologyId, ProjectId, Result, Term, TermId, User, UserId,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectInfo {
    pub id: ProjectId,
    pub ontology: OntologyId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageInfo {
    pub id: ImageId,
    /// Physical size of one pixel, when the image is calibrated.
    pub resolution: Option<f64>,
}

/// Terms of the current ontology, by id.
#[derive(Debug, Clone, Default)]
pub struct TermDirectory {
    terms: HashMap<TermId, Term>,
}

impl TermDirectory {
    pub fn new(terms: impl IntoIterator<Item = Term>) -> Self {
        Self {
            terms: terms.into_iter().map(|t| (t.id, t)).collect(),
        }
    }

    pub fn get(&self, id: TermId) -> Option<&Term> {
        self.terms.get(&id)
    }

    /// Lookup for a term that must already be loaded.
    pub fn require(&self, id: TermId) -> Result<&Term> {
        self.get(id).ok_or(AnnoError::ReferenceDataMissing {
            kind: "term",
            id: id.get(),
        })
    }

    pub fn contains(&self, id: TermId) -> bool {
        self.terms.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: HashMap<UserId, User>,
}

impl UserDirectory {
    pub fn new(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.id, u)).collect(),
        }
    }

    pub fn require(&self, id: UserId) -> Result<&User> {
        self.users.get(&id).ok_or(AnnoError::ReferenceDataMissing {
            kind: "user",
            id: id.get(),
        })
    }
}

/// Everything a layer needs to know about where it lives.
#[derive(Debug, Clone)]
pub struct LayerContext {
    pub project: ProjectInfo,
    pub image: ImageInfo,
    /// User whose annotations this layer shows.
    pub owner: UserId,
    pub terms: TermDirectory,
    pub users: UserDirectory,
}
