//! Presentation layer: feedback rendering and log output.

pub mod logging;
pub mod render;

pub use logging::*;
pub use render::*;
