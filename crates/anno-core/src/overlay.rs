//! Popup overlay content.
//!
//! The layer decides *what* a popup shows; the canvas widget decides how
//! to draw it.

use crate::id::{AnnotationId, OntologyId, PopupHandle, TermId};
use kurbo::{Point, Size};
use std::fmt;

/// A popup placed on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub handle: PopupHandle,
    /// Top-left corner in canvas coordinates.
    pub anchor: Point,
    pub size: Size,
    pub content: PopupContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PopupContent {
    Annotation(AnnotationDetails),
    Measure(Measurement),
}

/// Detail card of a persisted annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationDetails {
    pub annotation: AnnotationId,
    /// Owner's display name.
    pub owner: String,
    pub terms: Vec<TermLabel>,
    pub suggestions: SuggestionState,
    /// Whether the "hide this feature" action is offered.
    pub can_hide: bool,
}

/// A term as shown in the popup, linking back to its ontology.
#[derive(Debug, Clone, PartialEq)]
pub struct TermLabel {
    pub id: TermId,
    pub name: String,
    pub ontology: OntologyId,
}

impl TermLabel {
    /// In-app route of the term's ontology page.
    pub fn href(&self) -> String {
        format!("#ontology/{}/{}", self.ontology, self.id)
    }
}

/// Suggestion section of the detail card, filled in asynchronously.
#[derive(Debug, Clone, PartialEq)]
pub enum SuggestionState {
    Loading,
    Ready(Vec<SuggestedTerm>),
    /// The retrieval service could not be reached.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuggestedTerm {
    pub term: TermId,
    pub name: String,
    pub confidence: u32,
}

/// Length of a measured path.
#[derive(Debug, Clone, PartialEq)]
pub enum Measurement {
    /// Converted with the image resolution, already rounded.
    Physical { value: f64, unit: String },
    Pixels(f64),
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measurement::Physical { value, unit } => write!(f, "{value} {unit}"),
            Measurement::Pixels(value) => write!(f, "{value} pixels"),
        }
    }
}
