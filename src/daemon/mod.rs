mod handle;
mod registry;
mod template;

pub use handle::*;
pub use registry::*;
pub use template::*;
