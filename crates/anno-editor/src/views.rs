//! Presenters the layer drives but does not own: the ontology tree, toast
//! messages, the browse view and the gesture handlers of the map widget.
//!
//! All of them are synchronous and called on the UI thread.

use crate::tools::{EditMask, ToolKind, ToolOptions};
use anno_core::{AnnotationId, FeatureKey, Style, TermId};

/// Side panel listing the ontology terms with a checkbox each.
pub trait OntologyTree {
    /// Terms currently checked, in tree order.
    fn checked_terms(&self) -> Vec<TermId>;
    fn check(&self, term: TermId);
    fn uncheck(&self, term: TermId);
    /// Reload the checkboxes from the terms of `annotation`.
    fn refresh(&self, annotation: AnnotationId);
    fn clear(&self);
    /// Forget the annotation the tree was showing.
    fn clear_annotation(&self);
}

/// Transient user-facing messages.
pub trait Notifier {
    fn message(&self, title: &str, body: &str);
}

pub trait BrowseView {
    /// Reload the annotation tabs and listings of the image.
    fn refresh_annotation_listings(&self);
    /// The layer finished its initial load.
    fn layer_loaded(&self);
}

/// Gesture handlers of the map widget.
///
/// `select` and `unselect_all` change the widget's selection without
/// reporting a `GestureEvent` back; the layer runs its own select handling.
pub trait GestureControls {
    fn arm(&self, tool: ToolKind);
    fn disarm(&self, tool: ToolKind);
    fn configure(&self, options: &ToolOptions);
    /// Style of selected features.
    fn set_select_style(&self, style: &Style);
    fn select(&self, feature: FeatureKey);
    fn unselect_all(&self);
    /// Put a selected feature under the modify handler.
    fn edit(&self, feature: FeatureKey, mask: EditMask);
    fn release(&self, feature: FeatureKey);
}
