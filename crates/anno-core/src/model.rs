//! Data model shared by the layer engine.
//!
//! Two families live here: the remote records mirrored from the annotation
//! store (`Annotation`, `AnnotationTerm`, `Term`, `User`, retrieval hits),
//! and the local `VectorFeature` that the canvas renders. Remote records
//! serialize with the store's JSON field names.

use crate::error::Result;
use crate::geometry::Geometry;
use crate::id::*;
use crate::{emitter, parser};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

// ─── Colors & Style ──────────────────────────────────────────────────────

/// RGBA color. Stored as 4 × f32 [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Helper to parse a single hex digit.
fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Color {
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RGB`, `#RRGGBB` or `#RRGGBBAA`. The `#` is optional.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let bytes = hex.as_bytes();
        let channel = |i: usize| Some(hex_val(bytes[i])? << 4 | hex_val(bytes[i + 1])?);

        match bytes.len() {
            3 => {
                let r = hex_val(bytes[0])?;
                let g = hex_val(bytes[1])?;
                let b = hex_val(bytes[2])?;
                Some(Self::rgba(
                    (r * 17) as f32 / 255.0,
                    (g * 17) as f32 / 255.0,
                    (b * 17) as f32 / 255.0,
                    1.0,
                ))
            }
            6 | 8 => {
                let a = if bytes.len() == 8 { channel(6)? } else { 255 };
                Some(Self::rgba(
                    channel(0)? as f32 / 255.0,
                    channel(2)? as f32 / 255.0,
                    channel(4)? as f32 / 255.0,
                    a as f32 / 255.0,
                ))
            }
            _ => None,
        }
    }

    /// `#RRGGBB`, or `#RRGGBBAA` when not fully opaque.
    pub fn to_hex(&self) -> String {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        let (r, g, b, a) = (q(self.r), q(self.g), q(self.b), q(self.a));
        if a == 255 {
            format!("#{r:02X}{g:02X}{b:02X}")
        } else {
            format!("#{r:02X}{g:02X}{b:02X}{a:02X}")
        }
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).ok_or_else(|| serde::de::Error::custom(format!("bad color {s:?}")))
    }
}

/// Render style of a feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Style {
    pub stroke_color: Color,
    pub fill_color: Color,
    pub fill_opacity: f32,
    /// Kept in the store but not painted (`display: none`).
    pub hidden: bool,
}

impl Style {
    pub fn filled(color: Color, fill_opacity: f32) -> Self {
        Self {
            stroke_color: color,
            fill_color: color,
            fill_opacity,
            hidden: false,
        }
    }
}

// ─── Vector features ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureAttributes {
    /// Transient measurement, discarded when leaving measure mode.
    pub measure_only: bool,
    /// Set on features that came from the store: adding them must not
    /// trigger another create.
    pub suppress_persist: bool,
    /// Popup currently open for this feature.
    pub popup: Option<PopupHandle>,
}

/// The rendered representation of an annotation (or of a shape that is
/// about to become one).
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFeature {
    pub local_id: LocalId,
    /// `None` until the remote store has persisted it.
    pub annotation_id: Option<AnnotationId>,
    pub geometry: Geometry,
    pub style: Style,
    pub attributes: FeatureAttributes,
}

impl VectorFeature {
    /// A freshly drawn shape awaiting persistence.
    pub fn provisional(geometry: Geometry, style: Style) -> Self {
        Self {
            local_id: LocalId::next(),
            annotation_id: None,
            geometry,
            style,
            attributes: FeatureAttributes::default(),
        }
    }

    /// A feature mirroring a persisted annotation.
    pub fn authoritative(id: AnnotationId, geometry: Geometry, style: Style) -> Self {
        Self {
            local_id: LocalId::next(),
            annotation_id: Some(id),
            geometry,
            style,
            attributes: FeatureAttributes {
                suppress_persist: true,
                ..FeatureAttributes::default()
            },
        }
    }

    /// A transient ruler line.
    pub fn measurement(geometry: Geometry, style: Style) -> Self {
        Self {
            local_id: LocalId::next(),
            annotation_id: None,
            geometry,
            style,
            attributes: FeatureAttributes {
                measure_only: true,
                suppress_persist: true,
                popup: None,
            },
        }
    }

    pub fn key(&self) -> FeatureKey {
        match self.annotation_id {
            Some(id) => FeatureKey::Annotation(id),
            None => FeatureKey::Local(self.local_id),
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.annotation_id.is_none() && !self.attributes.measure_only
    }

    /// Encode the geometry for the wire.
    pub fn to_wkt(&self) -> Result<String> {
        emitter::emit_wkt(&self.geometry)
    }
}

// ─── Remote records ──────────────────────────────────────────────────────

/// Term ids attached to one annotation. Most annotations carry one or two.
pub type TermSet = SmallVec<[TermId; 4]>;

/// A persisted annotation, as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub image: ImageId,
    pub user: UserId,
    /// WKT geometry.
    pub location: String,
    #[serde(rename = "term", default)]
    pub terms: TermSet,
}

impl Annotation {
    pub fn geometry(&self) -> Result<Geometry> {
        parser::parse_wkt(&self.location)
    }

    pub fn has_term(&self, term: TermId) -> bool {
        self.terms.contains(&term)
    }
}

/// Body of an annotation create request (the "shell": no terms yet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDraft {
    #[serde(default)]
    pub name: String,
    pub location: String,
    pub image: ImageId,
}

/// Association between an annotation and a term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationTerm {
    pub annotation: AnnotationId,
    pub term: TermId,
    /// Replace every other term of the annotation with this one.
    #[serde(rename = "clear", default, skip_serializing_if = "std::ops::Not::not")]
    pub clear_others: bool,
}

impl AnnotationTerm {
    pub fn new(annotation: AnnotationId, term: TermId) -> Self {
        Self {
            annotation,
            term,
            clear_others: false,
        }
    }

    pub fn replacing(annotation: AnnotationId, term: TermId) -> Self {
        Self {
            annotation,
            term,
            clear_others: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub id: TermId,
    pub name: String,
    pub color: Color,
    pub ontology: OntologyId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
}

impl User {
    /// Display name: "First Last" when known, otherwise the username.
    pub fn pretty_name(&self) -> String {
        match (&self.firstname, &self.lastname) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(name), None) | (None, Some(name)) => name.clone(),
            (None, None) => self.username.clone(),
        }
    }
}

/// One result of a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    #[serde(rename = "id")]
    pub annotation: AnnotationId,
    #[serde(rename = "term", default)]
    pub terms: Vec<TermId>,
    pub similarity: f64,
}

/// A ranked term recommendation. Derived on demand, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TermSuggestion {
    pub term: TermId,
    pub aggregated_similarity: f64,
    /// 1 for the best candidate.
    pub rank: usize,
    /// Share of the total aggregated similarity, as a rounded percentage.
    pub confidence: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use pretty_assertions::assert_eq;

    #[test]
    fn color_hex_roundtrip() {
        let c = Color::from_hex("#25465D").unwrap();
        assert_eq!(c.to_hex(), "#25465D");
        assert_eq!(Color::from_hex("333").unwrap().to_hex(), "#333333");
        assert_eq!(Color::from_hex("#00000080").unwrap().to_hex(), "#00000080");
        assert!(Color::from_hex("#12").is_none());
        assert!(Color::from_hex("#GG0000").is_none());
    }

    #[test]
    fn annotation_uses_store_field_names() {
        let json = r#"{"id":101,"image":42,"user":3,"location":"POINT(1 2)","term":[7,9]}"#;
        let annotation: Annotation = serde_json::from_str(json).unwrap();
        assert_eq!(annotation.id, AnnotationId(101));
        assert_eq!(annotation.terms.as_slice(), &[TermId(7), TermId(9)]);
        assert_eq!(
            annotation.geometry().unwrap(),
            Geometry::Point(Point::new(1.0, 2.0))
        );
    }

    #[test]
    fn annotation_term_clear_flag_only_sent_when_set() {
        let plain = serde_json::to_string(&AnnotationTerm::new(AnnotationId(1), TermId(2))).unwrap();
        assert_eq!(plain, r#"{"annotation":1,"term":2}"#);
        let replacing =
            serde_json::to_string(&AnnotationTerm::replacing(AnnotationId(1), TermId(2))).unwrap();
        assert_eq!(replacing, r#"{"annotation":1,"term":2,"clear":true}"#);
    }

    #[test]
    fn feature_key_follows_persistence() {
        let style = Style::filled(Color::BLACK, 0.5);
        let draft = VectorFeature::provisional(Geometry::Point(Point::ORIGIN), style);
        assert!(matches!(draft.key(), FeatureKey::Local(_)));
        assert!(draft.is_provisional());

        let saved =
            VectorFeature::authoritative(AnnotationId(4), Geometry::Point(Point::ORIGIN), style);
        assert_eq!(saved.key(), FeatureKey::Annotation(AnnotationId(4)));
        assert!(saved.attributes.suppress_persist);

        let ruler = VectorFeature::measurement(Geometry::Point(Point::ORIGIN), style);
        assert!(!ruler.is_provisional());
    }

    #[test]
    fn user_pretty_name_falls_back_to_username() {
        let mut user = User {
            id: UserId(1),
            username: "jdoe".into(),
            firstname: None,
            lastname: None,
        };
        assert_eq!(user.pretty_name(), "jdoe");
        user.firstname = Some("Jane".into());
        user.lastname = Some("Doe".into());
        assert_eq!(user.pretty_name(), "Jane Doe");
    }
}
