pub mod image;
pub mod outcome;
pub mod registry;

pub use image::*;
pub use outcome::*;
pub use registry::*;
