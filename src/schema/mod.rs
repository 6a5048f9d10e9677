//! Schema model and renderer
//!
//! - [`node`]: the recursive schema node model
//! - [`render`]: depth-bounded rendering into presentation-ready trees

pub mod node;
pub mod render;

pub use node::*;
pub use render::*;
