//! Update-schedule systems, grouped by phase.

pub mod activation;
pub mod combat;
pub mod director;
pub mod render;
pub mod step;

pub use activation::*;
pub use combat::*;
pub use director::*;
pub use render::*;
pub use step::*;
