pub mod cluster;
pub mod global;

pub use cluster::*;
pub use global::*;
