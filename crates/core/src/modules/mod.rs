pub mod descriptors;
pub mod registry;
pub mod resolver;

pub use descriptors::{ConfigSchema, ModuleDescriptor, SchemaEntry};
pub use registry::{
    register_module, register_schema, registry_snapshot, replace_registry, reset_registry, ModuleInitializer,
    ModuleRegistry,
};
pub use resolver::{resolve_modules, ResolvedModule};
