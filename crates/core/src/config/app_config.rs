use crate::config::validation::{validate_app_config, ConfigError};
use crate::modules::descriptors::ConfigSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key carrying the type identity of a config object.
pub const TYPE_FIELD: &str = "@type";

/// Normalized deployment configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    /// Module entries in declaration order
    pub modules: Vec<ModuleConfigEntry>,
    /// Bindings applied anywhere an ambiguity is otherwise unresolved
    pub bindings: Vec<Binding>,
}

/// One configured module instance
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleConfigEntry {
    pub name: String,
    pub config: ConfigPayload,
    /// Bindings consulted first for ambiguities inside this module's providers
    pub bindings: Vec<Binding>,
}

/// Typed config object: a type identity plus the remaining fields
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigPayload {
    pub type_url: String,
    pub value: Value,
}

/// Interface to implementation choice
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    #[serde(rename = "interfaceType", alias = "interface_type")]
    pub interface: String,
    pub implementation: String,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module entry
    pub fn with_module(mut self, entry: ModuleConfigEntry) -> Self {
        self.modules.push(entry);
        self
    }

    /// Add a global binding
    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Find a module entry by name
    pub fn module(&self, name: &str) -> Option<&ModuleConfigEntry> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Check names, payloads and binding lists
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_app_config(self)
    }
}

impl ConfigSchema for AppConfig {
    const TYPE_URL: &'static str = "appwire.app.v1.Config";
}

impl ModuleConfigEntry {
    pub fn new(name: impl Into<String>, config: ConfigPayload) -> Self {
        Self {
            name: name.into(),
            config,
            bindings: Vec::new(),
        }
    }

    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }
}

impl ConfigPayload {
    pub fn new(type_url: impl Into<String>, value: Value) -> Self {
        Self {
            type_url: normalize_type_url(&type_url.into()),
            value,
        }
    }

    /// Build a payload from a typed config value
    pub fn of<C: ConfigSchema + Serialize>(config: &C) -> Result<Self, ConfigError> {
        Ok(Self::new(C::TYPE_URL, serde_json::to_value(config)?))
    }

    /// Split an object carrying an `@type` field into identity and fields
    fn from_object(module: &str, value: Value) -> Result<Self, ConfigError> {
        let mut fields = match value {
            Value::Object(fields) => fields,
            _ => {
                return Err(ConfigError::MissingTypeTag {
                    name: module.to_string(),
                })
            }
        };

        let type_url = match fields.remove(TYPE_FIELD) {
            Some(Value::String(type_url)) if !type_url.trim().is_empty() => type_url,
            _ => {
                return Err(ConfigError::MissingTypeTag {
                    name: module.to_string(),
                })
            }
        };

        Ok(Self::new(type_url, Value::Object(fields)))
    }
}

impl Binding {
    pub fn new(interface: impl Into<String>, implementation: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            implementation: implementation.into(),
        }
    }
}

/// Strip any URL prefix: `type.googleapis.com/x.Y` and `/x.Y` both name `x.Y`.
pub fn normalize_type_url(type_url: &str) -> String {
    let trimmed = type_url.trim();
    match trimmed.rfind('/') {
        Some(idx) => trimmed[idx + 1..].to_string(),
        None => trimmed.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct RawAppConfig {
    #[serde(default)]
    modules: Vec<RawModuleConfig>,
    #[serde(default, alias = "golang_bindings")]
    bindings: Vec<RawBinding>,
}

#[derive(Debug, Deserialize)]
struct RawModuleConfig {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    config: Option<Value>,
    #[serde(default, alias = "golang_bindings")]
    bindings: Vec<RawBinding>,
}

#[derive(Debug, Deserialize)]
struct RawBinding {
    #[serde(default, rename = "interfaceType", alias = "interface_type")]
    interface: Option<String>,
    #[serde(default)]
    implementation: Option<String>,
}

impl RawBinding {
    fn normalize(self) -> Binding {
        Binding::new(
            self.interface.unwrap_or_default().trim(),
            self.implementation.unwrap_or_default().trim(),
        )
    }
}

impl RawAppConfig {
    fn normalize(self) -> Result<AppConfig, ConfigError> {
        let mut modules = Vec::with_capacity(self.modules.len());

        for (index, raw) in self.modules.into_iter().enumerate() {
            let name = match raw.name {
                Some(name) if !name.trim().is_empty() => name,
                _ => return Err(ConfigError::MissingName { index }),
            };

            let config = match raw.config {
                Some(Value::Null) | None => return Err(ConfigError::MissingConfig { name }),
                Some(value) => ConfigPayload::from_object(&name, value)?,
            };

            modules.push(ModuleConfigEntry {
                name,
                config,
                bindings: raw.bindings.into_iter().map(RawBinding::normalize).collect(),
            });
        }

        let config = AppConfig {
            modules,
            bindings: self.bindings.into_iter().map(RawBinding::normalize).collect(),
        };
        config.validate()?;

        tracing::debug!(
            "Normalized app config with {} modules and {} global bindings",
            config.modules.len(),
            config.bindings.len()
        );

        Ok(config)
    }
}

/// Parse and normalize a JSON app config
pub fn load_json(bytes: &[u8]) -> Result<AppConfig, ConfigError> {
    let raw: RawAppConfig = serde_json::from_slice(bytes)?;
    raw.normalize()
}

/// Parse and normalize a YAML app config
pub fn load_yaml(bytes: &[u8]) -> Result<AppConfig, ConfigError> {
    let raw: RawAppConfig = serde_yaml::from_slice(bytes)?;
    raw.normalize()
}
