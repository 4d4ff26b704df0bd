pub mod guideline;
pub mod incident;
pub mod intent;
pub mod resource;

pub use guideline::*;
pub use incident::*;
pub use intent::*;
pub use resource::*;
