use crate::config::validation::ConfigError;
use thiserror::Error;

/// Name of the schema option that marks a config type as a module config.
pub const MODULE_OPTION: &str = "appwire.app.v1.module";

/// Core error type for a resolution run
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unable to resolve {type_url}: no config schema with that name is known")]
    UnknownConfigType { type_url: String },

    #[error(
        "config type {type_url} used by module \"{module}\" does not have the option {}, registered modules are:{}",
        MODULE_OPTION,
        format_registered(.registered)
    )]
    NotAModuleConfig {
        module: String,
        type_url: String,
        registered: Vec<String>,
    },

    #[error(
        "no module registered for config type {type_url} used by module \"{module}\", did you forget to import {import_path}? registered modules are:{}",
        format_registered(.registered)
    )]
    ModuleNotRegistered {
        module: String,
        type_url: String,
        import_path: String,
        registered: Vec<String>,
    },

    #[error("config type {type_url} registered as a module should have the option {}", MODULE_OPTION)]
    MissingModuleOption { type_url: String },

    #[error("config type {type_url} registered as a module should have ModuleDescriptor.import_path specified")]
    MissingImportPath { type_url: String },

    #[error("Invalid provider '{provider}': {message}")]
    InvalidProvider { provider: String, message: String },

    #[error("duplicate provision of {type_name} (implementation {implementation}) by providers: {}", .providers.join(", "))]
    DuplicateProvider {
        type_name: String,
        implementation: String,
        providers: Vec<String>,
    },

    #[error(
        "multiple implementations of {type_name} requested in {scope}: {}; add a binding to choose one",
        .candidates.join(", ")
    )]
    Ambiguous {
        type_name: String,
        scope: String,
        candidates: Vec<String>,
    },

    #[error(
        "binding target not found: {scope} binding {interface} -> {implementation} matches none of the candidates: {}",
        .candidates.join(", ")
    )]
    BindingTargetNotFound {
        interface: String,
        implementation: String,
        scope: String,
        candidates: Vec<String>,
    },

    #[error("Dependency resolution failed for '{type_name}': no provider found (required by {required_by})")]
    MissingDependency {
        type_name: String,
        required_by: String,
    },

    #[error("{type_name} is provided per module and cannot be requested by {required_by} outside a module")]
    ModuleScopeRequired {
        type_name: String,
        required_by: String,
    },

    #[error("Circular dependency detected: {path} (cycle at: {cycle_service})")]
    CircularDependency { path: String, cycle_service: String },

    #[error("requested output {type_name} was never provided")]
    MissingOutput { type_name: String },

    #[error("provider '{provider}' failed while building {type_name} in {scope}: {source}")]
    ProviderFailed {
        provider: String,
        type_name: String,
        scope: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Provider error: {message}")]
    Provider { message: String },

    #[error("Lock error on resource: {resource}")]
    LockError { resource: String },
}

impl CoreError {
    /// Create an error raised from inside a provider body
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    pub fn invalid_provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidProvider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn lock_error(resource: impl Into<String>) -> Self {
        Self::LockError {
            resource: resource.into(),
        }
    }

    /// Check if the error comes from config normalization
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if the error is a type resolution failure
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::UnknownConfigType { .. } | Self::NotAModuleConfig { .. } | Self::ModuleNotRegistered { .. }
        )
    }

    /// Check if the error is caused by a bad module or provider registration
    pub fn is_registration(&self) -> bool {
        matches!(
            self,
            Self::MissingModuleOption { .. }
                | Self::MissingImportPath { .. }
                | Self::InvalidProvider { .. }
                | Self::DuplicateProvider { .. }
        )
    }

    /// Check if the error is an unresolved ambiguity or a bad binding
    pub fn is_ambiguity(&self) -> bool {
        matches!(self, Self::Ambiguous { .. } | Self::BindingTargetNotFound { .. })
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }
}

fn format_registered(registered: &[String]) -> String {
    if registered.is_empty() {
        return " (none)".to_string();
    }
    registered.iter().map(|name| format!("\n\t{}", name)).collect()
}
