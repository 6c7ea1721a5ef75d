//! Declarative, config-driven composition of modular applications.
//!
//! Modules register typed providers with a [`ModuleRegistry`]; an [`AppConfig`]
//! loaded from JSON or YAML names the participating modules and the bindings that
//! settle ambiguous interfaces; a [`Container`] resolves the provider graph and
//! fills the caller's [`OutputSlot`]s.

pub mod errors;
pub mod config;
pub mod container;
pub mod modules;
pub mod providers;

pub use errors::{CoreError, MODULE_OPTION};
pub use config::{load_json, load_yaml, AppConfig, Binding, ConfigError, ConfigPayload, ModuleConfigEntry};
pub use container::{
    inject, Container, ContainerBuilder, ManySlot, ModuleKey, ModuleMap, ModuleMapSlot, OutputSlot, RunReport, Scope,
    Slot, TypeTag,
};
pub use modules::{
    register_module, register_schema, registry_snapshot, reset_registry, ConfigSchema, ModuleDescriptor,
    ModuleInitializer, ModuleRegistry,
};
pub use providers::{Provider, ProviderContext, ProviderResult};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get crate version
pub fn version() -> &'static str {
    VERSION
}
