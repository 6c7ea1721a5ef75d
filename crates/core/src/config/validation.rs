use crate::config::app_config::{AppConfig, Binding, ModuleConfigEntry};
use std::collections::HashSet;
use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("module is missing name (modules[{index}])")]
    MissingName { index: usize },

    #[error("module \"{name}\" is missing a config object")]
    MissingConfig { name: String },

    #[error("module \"{name}\" config object is missing an @type field")]
    MissingTypeTag { name: String },

    #[error("duplicate module name \"{name}\"")]
    DuplicateModule { name: String },

    #[error("binding #{index} in {location} should have {field} specified")]
    MissingBindingField {
        location: String,
        index: usize,
        field: &'static str,
    },

    #[error("duplicate binding for interface {interface} in {location}")]
    DuplicateBinding { location: String, interface: String },

    #[error("failed to decode config for module \"{module}\" ({type_url}): {message}")]
    DecodeFailed {
        module: String,
        type_url: String,
        message: String,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn missing_binding_field(location: impl Into<String>, index: usize, field: &'static str) -> Self {
        Self::MissingBindingField {
            location: location.into(),
            index,
            field,
        }
    }

    pub fn decode_failed(
        module: impl Into<String>,
        type_url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::DecodeFailed {
            module: module.into(),
            type_url: type_url.into(),
            message: message.into(),
        }
    }
}

/// Trait for validating configuration values
pub trait ConfigValidator<T: ?Sized> {
    /// Validate a configuration value
    fn validate(&self, value: &T) -> Result<(), ConfigError>;
}

/// Checks module entries: non-empty, unique names and a typed config payload.
#[derive(Debug, Default)]
pub struct ModuleEntriesValidator;

impl ConfigValidator<[ModuleConfigEntry]> for ModuleEntriesValidator {
    fn validate(&self, modules: &[ModuleConfigEntry]) -> Result<(), ConfigError> {
        let mut names = HashSet::new();

        for (index, module) in modules.iter().enumerate() {
            if module.name.trim().is_empty() {
                return Err(ConfigError::MissingName { index });
            }
            if module.config.type_url.is_empty() {
                return Err(ConfigError::MissingTypeTag {
                    name: module.name.clone(),
                });
            }
            if !names.insert(module.name.as_str()) {
                return Err(ConfigError::DuplicateModule {
                    name: module.name.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Checks one binding list; `location` names the list in error messages.
#[derive(Debug)]
pub struct BindingListValidator {
    pub location: String,
}

impl BindingListValidator {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

impl ConfigValidator<[Binding]> for BindingListValidator {
    fn validate(&self, bindings: &[Binding]) -> Result<(), ConfigError> {
        let mut interfaces = HashSet::new();

        for (index, binding) in bindings.iter().enumerate() {
            if binding.interface.is_empty() {
                return Err(ConfigError::missing_binding_field(&self.location, index, "interfaceType"));
            }
            if binding.implementation.is_empty() {
                return Err(ConfigError::missing_binding_field(&self.location, index, "implementation"));
            }
            if !interfaces.insert(binding.interface.as_str()) {
                return Err(ConfigError::DuplicateBinding {
                    location: self.location.clone(),
                    interface: binding.interface.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Runs every rule over a normalized config.
pub fn validate_app_config(config: &AppConfig) -> Result<(), ConfigError> {
    ModuleEntriesValidator.validate(config.modules.as_slice())?;
    BindingListValidator::new("global bindings").validate(config.bindings.as_slice())?;

    for module in &config.modules {
        BindingListValidator::new(format!("module \"{}\" bindings", module.name)).validate(module.bindings.as_slice())?;
    }

    Ok(())
}
