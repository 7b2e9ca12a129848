pub mod config;
pub mod content;
pub mod logic;
pub mod model;
pub mod store;

// Export content types
pub use content::{ContentConverter, ContentError, ConverterRegistry, ModelContent};

// Export logic types
pub use logic::{
    reconcile_by_model_type, section_name, ExtensionsValidator, IdentifierMap, ImportStrategy,
    ProjectExporter, ProjectImporter, SchemaError, SchemaFlattener,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, Store};
