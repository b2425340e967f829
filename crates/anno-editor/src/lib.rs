pub mod config;
pub mod context;
pub mod input;
pub mod layer;
pub mod memory;
pub mod popup;
pub mod remote;
pub mod state;
pub mod suggest;
pub mod sync;
pub mod tools;
pub mod views;

pub use config::LayerConfig;
pub use context::{ImageInfo, LayerContext, ProjectInfo, TermDirectory, UserDirectory};
pub use input::{GestureEvent, PointerEvent};
pub use layer::AnnotationLayer;
pub use remote::{Ack, AnnotationStore, Created, RetrievalService, TransactionId};
pub use state::Services;
pub use tools::{EditMask, InteractionMode, ModeController, ModeEffect, ShapeKind, ToolKind};
pub use views::{BrowseView, GestureControls, Notifier, OntologyTree};
