pub mod emitter;
pub mod error;
pub mod geometry;
pub mod id;
pub mod model;
pub mod overlay;
pub mod parser;
pub mod store;

pub use emitter::emit_wkt;
pub use error::{AnnoError, Result};
pub use geometry::{Geometry, Point, Ring};
pub use id::*;
pub use model::*;
pub use overlay::*;
pub use parser::parse_wkt;
pub use store::{Canvas, FeatureStore};

// Re-export kurbo types so downstream crates don't need a direct dependency
pub use kurbo::{Rect, Size};
