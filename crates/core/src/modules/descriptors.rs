//! Schema metadata for config types.
//!
//! A config type becomes usable in an app config by implementing [`ConfigSchema`].
//! Only schemas that return a [`ModuleDescriptor`] may be used as module configs;
//! the descriptor carries the import path named in "did you forget to import"
//! diagnostics.

use crate::container::descriptor::TypeTag;

/// Module option attached to a config schema
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleDescriptor {
    /// Location of the code that registers the module's initializer
    pub import_path: String,
    /// Optional human readable name used in logs
    pub display_name: Option<String>,
}

impl ModuleDescriptor {
    pub fn new(import_path: impl Into<String>) -> Self {
        Self {
            import_path: import_path.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// A config type with a stable type identity
pub trait ConfigSchema: 'static {
    /// Type identity matched against the `@type` field of a config object
    const TYPE_URL: &'static str;

    /// The module option; `None` for config types that are not module configs
    fn module_descriptor() -> Option<ModuleDescriptor> {
        None
    }
}

/// Type-erased schema record kept by the registry
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaEntry {
    pub type_url: String,
    pub descriptor: Option<ModuleDescriptor>,
    pub tag: TypeTag,
}

impl SchemaEntry {
    pub fn of<C: ConfigSchema>() -> Self {
        Self {
            type_url: C::TYPE_URL.to_string(),
            descriptor: C::module_descriptor(),
            tag: TypeTag::of::<C>(),
        }
    }

    /// Check if the schema carries the module option
    pub fn is_module(&self) -> bool {
        self.descriptor.is_some()
    }
}
