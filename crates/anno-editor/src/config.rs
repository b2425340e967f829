//! Layer configuration: colors, popup placement, tool defaults.

use crate::context::TermDirectory;
use anno_core::{Annotation, Color, Style};
use serde::Deserialize;

/// Configuration for an `AnnotationLayer`.
///
/// Every field has a default, so a config file only needs the fields it
/// overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Display name of the layer.
    pub name: String,

    /// Fill of freshly drawn shapes, before the store answers.
    pub color: Color,
    pub draw_fill_opacity: f32,
    pub stroke_color: Color,

    /// Fill of the selected feature.
    pub select_color: Color,
    pub select_fill_opacity: f32,

    /// Fill opacity of persisted annotations.
    pub annotation_fill_opacity: f32,
    /// Color of an annotation without any term.
    pub untermed_color: Color,
    /// Color of an annotation carrying more than one term.
    pub multi_term_color: Color,

    /// Default vertex count of the regular-polygon tool.
    pub regular_sides: u32,

    /// Distance between a feature's bounds and its popup.
    pub popup_offset: f64,

    /// Unit of `resolution`-scaled measurements.
    pub physical_unit: String,
    /// Decimals kept on physical measurements.
    pub measure_precision: u32,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            name: "annotations".to_string(),
            color: Color::rgba(1.0, 0.0, 0.0, 1.0),
            draw_fill_opacity: 0.5,
            stroke_color: Color::BLACK,
            select_color: Color::rgba(37.0 / 255.0, 70.0 / 255.0, 93.0 / 255.0, 1.0),
            select_fill_opacity: 0.5,
            annotation_fill_opacity: 0.6,
            untermed_color: Color::rgba(0.2, 0.2, 0.2, 1.0),
            multi_term_color: Color::BLACK,
            regular_sides: 5,
            popup_offset: 50.0,
            physical_unit: "µm".to_string(),
            measure_precision: 3,
        }
    }
}

impl LayerConfig {
    /// Style of a shape the user just drew.
    pub fn draw_style(&self) -> Style {
        Style {
            stroke_color: self.stroke_color,
            fill_color: self.color,
            fill_opacity: self.draw_fill_opacity,
            hidden: false,
        }
    }

    /// Style the select handler paints selected features with.
    pub fn select_style(&self) -> Style {
        Style {
            stroke_color: self.stroke_color,
            fill_color: self.select_color,
            fill_opacity: self.select_fill_opacity,
            hidden: false,
        }
    }

    /// Style of a persisted annotation, derived from its terms.
    pub fn annotation_style(&self, annotation: &Annotation, terms: &TermDirectory) -> Style {
        let color = match annotation.terms.as_slice() {
            [] => self.untermed_color,
            [single] => terms
                .get(*single)
                .map(|t| t.color)
                .unwrap_or(self.untermed_color),
            _ => self.multi_term_color,
        };
        Style::filled(color, self.annotation_fill_opacity)
    }
}
