//! Input abstraction layer.
//!
//! Two levels of events reach the layer. `PointerEvent` is the raw stream a
//! drawing tool consumes; `GestureEvent` is what a finished gesture means to
//! the layer (a shape was drawn, a feature was picked, a reshape ended).

use anno_core::{FeatureKey, Geometry, Point};

/// A normalized pointer event, in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    /// Pointer pressed (mouse down, touch start, pencil contact).
    Down(Point),
    /// Pointer moved, pressed or not.
    Move(Point),
    /// Pointer released.
    Up(Point),
    /// Double click or Enter: close the path being drawn.
    Finish,
    /// Escape: drop the path being drawn.
    Cancel,
}

impl PointerEvent {
    /// Extract position if this event carries one.
    pub fn position(&self) -> Option<Point> {
        match self {
            Self::Down(p) | Self::Move(p) | Self::Up(p) => Some(*p),
            Self::Finish | Self::Cancel => None,
        }
    }
}

/// A completed gesture, as reported by the map widget.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureEvent {
    /// A draw tool produced a shape.
    DrawComplete { geometry: Geometry },
    /// A feature was picked by the select handler.
    Select { feature: FeatureKey },
    /// A feature lost its selection.
    Deselect { feature: FeatureKey },
    /// A reshape, rotate, resize or drag of a feature ended.
    ModifyComplete {
        feature: FeatureKey,
        geometry: Geometry,
    },
}

impl GestureEvent {
    /// Feature this gesture targets, if any.
    pub fn feature(&self) -> Option<FeatureKey> {
        match self {
            Self::DrawComplete { .. } => None,
            Self::Select { feature }
            | Self::Deselect { feature }
            | Self::ModifyComplete { feature, .. } => Some(*feature),
        }
    }
}
