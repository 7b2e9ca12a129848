pub mod bundle;
pub mod export;
pub mod flatten;
pub mod identifiers;
pub mod import;
pub mod reconcile;
pub mod resources;
pub mod validate;

pub use bundle::*;
pub use export::*;
pub use flatten::*;
pub use identifiers::*;
pub use import::*;
pub use reconcile::*;
pub use resources::*;
pub use validate::*;
