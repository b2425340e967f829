//! Session script format.

use anno_core::{
    Annotation, AnnotationId, ImageId, OntologyId, Point, ProjectId, RetrievalHit, Term, TermId,
    User, UserId,
};
use anno_editor::memory::StoreOp;
use anno_editor::{
    AnnotationLayer, ImageInfo, InteractionMode, LayerContext, PointerEvent, ProjectInfo,
    ShapeKind, TermDirectory, UserDirectory,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Session {
    pub context: SessionContext,
    /// Annotations already in the store when the session starts.
    #[serde(default)]
    pub seed: Vec<Annotation>,
    /// What the retrieval service answers for any annotation.
    #[serde(default)]
    pub retrieval: Vec<RetrievalHit>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
pub struct SessionContext {
    pub project: ProjectId,
    pub ontology: OntologyId,
    pub image: ImageId,
    #[serde(default)]
    pub resolution: Option<f64>,
    pub owner: UserId,
    pub terms: Vec<Term>,
    pub users: Vec<User>,
}

impl SessionContext {
    pub fn build(&self) -> LayerContext {
        LayerContext {
            project: ProjectInfo {
                id: self.project,
                ontology: self.ontology,
            },
            image: ImageInfo {
                id: self.image,
                resolution: self.resolution,
            },
            owner: self.owner,
            terms: TermDirectory::new(self.terms.iter().cloned()),
            users: UserDirectory::new(self.users.iter().cloned()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Terms checked in the ontology tree from now on.
    Check { terms: Vec<TermId> },
    Mode { mode: ModeName },
    Toggle { option: ToggleName },
    Sides { sides: u32 },
    /// A finished shape, as WKT.
    Draw { wkt: String },
    /// Raw pointer input for the armed draw tool.
    Pointer { events: Vec<PointerStep> },
    Select { annotation: AnnotationId },
    Deselect { annotation: AnnotationId },
    Modify { annotation: AnnotationId, wkt: String },
    Delete { annotation: AnnotationId },
    Hide { annotation: AnnotationId },
    Show { annotation: AnnotationId },
    Accept { annotation: AnnotationId, term: TermId },
    Fail { op: StoreOp, message: String },
    Recover { op: StoreOp },
    Unreachable,
    PushAdded { annotation: Annotation },
    PushRemoved { annotation: AnnotationId },
    PushUpdated { annotation: Annotation },
    PushTerm { term: TermId, added: bool },
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeName {
    Idle,
    Select,
    Erase,
    Measure,
    Point,
    Line,
    Polygon,
    Freehand,
    Regular,
}

impl From<ModeName> for InteractionMode {
    fn from(name: ModeName) -> Self {
        match name {
            ModeName::Idle => InteractionMode::Idle,
            ModeName::Select => InteractionMode::Select,
            ModeName::Erase => InteractionMode::Erase,
            ModeName::Measure => InteractionMode::Measure,
            ModeName::Point => InteractionMode::Draw(ShapeKind::Point),
            ModeName::Line => InteractionMode::Draw(ShapeKind::Line),
            ModeName::Polygon => InteractionMode::Draw(ShapeKind::Polygon),
            ModeName::Freehand => InteractionMode::Draw(ShapeKind::Freehand),
            ModeName::Regular => InteractionMode::Draw(ShapeKind::RegularPolygon),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleName {
    Edit,
    Rotate,
    Resize,
    Drag,
    Irregular,
    AspectRatio,
}

impl ToggleName {
    pub fn apply(self, layer: &AnnotationLayer) {
        match self {
            ToggleName::Edit => layer.toggle_edit(),
            ToggleName::Rotate => layer.toggle_rotate(),
            ToggleName::Resize => layer.toggle_resize(),
            ToggleName::Drag => layer.toggle_drag(),
            ToggleName::Irregular => layer.toggle_irregular(),
            ToggleName::AspectRatio => layer.toggle_aspect_ratio(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerStep {
    Down([f64; 2]),
    Move([f64; 2]),
    Up([f64; 2]),
    Finish,
    Cancel,
}

impl From<PointerStep> for PointerEvent {
    fn from(step: PointerStep) -> Self {
        let at = |[x, y]: [f64; 2]| Point::new(x, y);
        match step {
            PointerStep::Down(p) => PointerEvent::Down(at(p)),
            PointerStep::Move(p) => PointerEvent::Move(at(p)),
            PointerStep::Up(p) => PointerEvent::Up(at(p)),
            PointerStep::Finish => PointerEvent::Finish,
            PointerStep::Cancel => PointerEvent::Cancel,
        }
    }
}
