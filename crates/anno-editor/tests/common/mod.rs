//! Shared fixture: a layer on image 42 of user 5, wired to the in-memory
//! collaborators.

#![allow(dead_code)]

use anno_core::*;
use anno_editor::memory::MemoryBackend;
use anno_editor::{
    AnnotationLayer, ImageInfo, LayerConfig, LayerContext, ProjectInfo, TermDirectory,
    UserDirectory,
};

pub const IMAGE: ImageId = ImageId(42);
pub const OWNER: UserId = UserId(5);
pub const TUMOR: TermId = TermId(7);
pub const STROMA: TermId = TermId(9);
pub const NECROSIS: TermId = TermId(11);

pub struct Fixture {
    pub backend: MemoryBackend,
    pub layer: AnnotationLayer,
}

fn term(id: TermId, name: &str, hex: &str) -> Term {
    Term {
        id,
        name: name.to_string(),
        color: Color::from_hex(hex).unwrap(),
        ontology: OntologyId(3),
    }
}

pub fn context(resolution: Option<f64>) -> LayerContext {
    LayerContext {
        project: ProjectInfo {
            id: ProjectId(1),
            ontology: OntologyId(3),
        },
        image: ImageInfo {
            id: IMAGE,
            resolution,
        },
        owner: OWNER,
        terms: TermDirectory::new([
            term(TUMOR, "Tumor", "#FF0000"),
            term(STROMA, "Stroma", "#00FF00"),
            term(NECROSIS, "Necrosis", "#0000FF"),
        ]),
        users: UserDirectory::new([User {
            id: OWNER,
            username: "jdoe".to_string(),
            firstname: Some("Jane".to_string()),
            lastname: Some("Doe".to_string()),
        }]),
    }
}

pub fn fixture() -> Fixture {
    fixture_with(Some(0.5))
}

pub fn fixture_with(resolution: Option<f64>) -> Fixture {
    fixture_in(context(resolution))
}

pub fn fixture_in(context: LayerContext) -> Fixture {
    let backend = MemoryBackend::new(OWNER);
    let layer = AnnotationLayer::new(LayerConfig::default(), context, backend.services());
    Fixture { backend, layer }
}

/// 100 × 100 square at the origin.
pub fn square() -> Geometry {
    Geometry::Polygon(vec![vec![
        Point::new(0.0, 0.0),
        Point::new(100.0, 0.0),
        Point::new(100.0, 100.0),
        Point::new(0.0, 100.0),
        Point::new(0.0, 0.0),
    ]])
}

pub fn annotation(id: u64, terms: &[TermId]) -> Annotation {
    Annotation {
        id: AnnotationId(id),
        image: IMAGE,
        user: OWNER,
        location: "POLYGON((10 10,20 10,20 20,10 10))".to_string(),
        terms: terms.iter().copied().collect(),
    }
}

pub fn key(id: u64) -> FeatureKey {
    FeatureKey::Annotation(AnnotationId(id))
}

impl Fixture {
    /// Seed the store with annotations and load them into the layer.
    pub async fn loaded(self, annotations: Vec<Annotation>) -> Self {
        for a in annotations {
            self.backend.store.insert(a);
        }
        self.layer.load_annotations().await.unwrap();
        self.backend.journal.clear();
        self
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.backend.journal.matching(prefix).len()
    }

    pub fn position(&self, prefix: &str) -> usize {
        self.backend
            .journal
            .position(prefix)
            .unwrap_or_else(|| panic!("no {prefix:?} in {:#?}", self.backend.journal.entries()))
    }
}
