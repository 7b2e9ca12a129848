pub mod common;
pub mod definition;
pub mod project;

pub use common::*;
pub use definition::*;
pub use project::*;
