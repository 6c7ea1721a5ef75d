use crate::config::app_config::AppConfig;
use crate::config::validation::ConfigError;
use crate::errors::CoreError;
use crate::modules::descriptors::{ConfigSchema, SchemaEntry};
use crate::providers::context::AnyValue;
use crate::providers::provider::Provider;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock, RwLock};

type ConfigDecoder = Arc<dyn Fn(&Value) -> Result<AnyValue, serde_json::Error> + Send + Sync>;

/// Providers and invokers contributed by one module config type
#[derive(Clone)]
pub struct ModuleInitializer {
    schema: SchemaEntry,
    decoder: ConfigDecoder,
    providers: Vec<Provider>,
    invokers: Vec<Provider>,
}

impl std::fmt::Debug for ModuleInitializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleInitializer")
            .field("type_url", &self.schema.type_url)
            .field("providers", &self.providers.iter().map(Provider::name).collect::<Vec<_>>())
            .field("invokers", &self.invokers.iter().map(Provider::name).collect::<Vec<_>>())
            .finish()
    }
}

impl ModuleInitializer {
    /// Initializer for modules configured by `C`
    pub fn new<C>() -> Self
    where
        C: ConfigSchema + DeserializeOwned + Send + Sync,
    {
        Self {
            schema: SchemaEntry::of::<C>(),
            decoder: Arc::new(|value| {
                let config: C = serde_json::from_value(value.clone())?;
                Ok(Arc::new(config) as AnyValue)
            }),
            providers: Vec::new(),
            invokers: Vec::new(),
        }
    }

    /// Add a provider owned by every module configured with this type
    pub fn provide(mut self, provider: Provider) -> Self {
        self.providers.push(provider);
        self
    }

    /// Add an invoker that runs for every module configured with this type
    pub fn invoke(mut self, invoker: Provider) -> Self {
        self.invokers.push(invoker);
        self
    }

    pub fn type_url(&self) -> &str {
        &self.schema.type_url
    }

    pub fn schema(&self) -> &SchemaEntry {
        &self.schema
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn invokers(&self) -> &[Provider] {
        &self.invokers
    }

    /// Decode a module's config payload into the registered config type
    pub(crate) fn decode(&self, module: &str, value: &Value) -> Result<AnyValue, CoreError> {
        (self.decoder)(value)
            .map_err(|e| ConfigError::decode_failed(module, self.type_url(), e.to_string()).into())
    }

    /// Check the descriptor rules and every declared provider
    pub fn validate(&self) -> Result<(), CoreError> {
        let descriptor = self.schema.descriptor.as_ref().ok_or_else(|| CoreError::MissingModuleOption {
            type_url: self.schema.type_url.clone(),
        })?;

        if descriptor.import_path.trim().is_empty() {
            return Err(CoreError::MissingImportPath {
                type_url: self.schema.type_url.clone(),
            });
        }

        for provider in &self.providers {
            provider.validate()?;
        }

        for invoker in &self.invokers {
            if !invoker.is_invoker() {
                return Err(CoreError::invalid_provider(
                    invoker.name(),
                    "invokers cannot declare outputs",
                ));
            }
            invoker.validate()?;
        }

        Ok(())
    }
}

/// Registry mapping config type identities to schemas and module initializers
#[derive(Debug, Clone)]
pub struct ModuleRegistry {
    schemas: HashMap<String, SchemaEntry>,
    initializers: HashMap<String, ModuleInitializer>,
    overwritten: Vec<String>,
}

impl ModuleRegistry {
    /// Create a registry that knows only the built-in app config schema
    pub fn new() -> Self {
        let mut registry = Self {
            schemas: HashMap::new(),
            initializers: HashMap::new(),
            overwritten: Vec::new(),
        };
        registry.register_schema::<AppConfig>();
        registry
    }

    /// Register a module initializer.
    ///
    /// An initializer that breaks the descriptor rules is still recorded, so every
    /// later resolution against this registry fails with the same error.
    pub fn register(&mut self, initializer: ModuleInitializer) -> Result<(), CoreError> {
        let type_url = initializer.type_url().to_string();
        let result = initializer.validate();

        self.schemas.insert(type_url.clone(), initializer.schema().clone());
        if self.initializers.insert(type_url.clone(), initializer).is_some() {
            tracing::warn!("Module initializer for {} was registered twice; keeping the latest", type_url);
            self.overwritten.push(type_url.clone());
        }

        match &result {
            Ok(()) => tracing::debug!("Registered module initializer for {}", type_url),
            Err(e) => tracing::warn!("Invalid module registration for {}: {}", type_url, e),
        }

        result
    }

    /// Make a config type known without registering an initializer for it
    pub fn register_schema<C: ConfigSchema>(&mut self) {
        let entry = SchemaEntry::of::<C>();
        self.schemas.insert(entry.type_url.clone(), entry);
    }

    pub fn schema(&self, type_url: &str) -> Option<&SchemaEntry> {
        self.schemas.get(type_url)
    }

    pub fn lookup(&self, type_url: &str) -> Option<&ModuleInitializer> {
        self.initializers.get(type_url)
    }

    /// Sorted type identities of every registered module initializer
    pub fn registered_modules(&self) -> Vec<String> {
        let mut names: Vec<String> = self.initializers.keys().cloned().collect();
        names.sort();
        names.dedup();
        names
    }

    /// Type identities whose initializer was replaced by a later registration
    pub fn overwritten(&self) -> &[String] {
        &self.overwritten
    }

    pub fn len(&self) -> usize {
        self.initializers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.initializers.is_empty()
    }

    /// Check every registered initializer, in sorted type order
    pub fn validate(&self) -> Result<(), CoreError> {
        self.modules_by_type_url().map(|_| ())
    }

    /// Validated initializers keyed by config type identity
    pub fn modules_by_type_url(&self) -> Result<BTreeMap<&str, &ModuleInitializer>, CoreError> {
        let modules: BTreeMap<&str, &ModuleInitializer> = self
            .initializers
            .iter()
            .map(|(type_url, initializer)| (type_url.as_str(), initializer))
            .collect();

        for initializer in modules.values() {
            initializer.validate()?;
        }

        Ok(modules)
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_MODULE_REGISTRY: OnceLock<RwLock<ModuleRegistry>> = OnceLock::new();

const GLOBAL_REGISTRY_RESOURCE: &str = "global module registry";

fn global_registry() -> &'static RwLock<ModuleRegistry> {
    GLOBAL_MODULE_REGISTRY.get_or_init(|| RwLock::new(ModuleRegistry::new()))
}

/// Register a module initializer in the process-wide registry
pub fn register_module(initializer: ModuleInitializer) -> Result<(), CoreError> {
    global_registry()
        .write()
        .map_err(|_| CoreError::lock_error(GLOBAL_REGISTRY_RESOURCE))?
        .register(initializer)
}

/// Make a config type known to the process-wide registry
pub fn register_schema<C: ConfigSchema>() -> Result<(), CoreError> {
    global_registry()
        .write()
        .map_err(|_| CoreError::lock_error(GLOBAL_REGISTRY_RESOURCE))?
        .register_schema::<C>();
    Ok(())
}

/// Get a copy of the process-wide registry
pub fn registry_snapshot() -> Result<ModuleRegistry, CoreError> {
    global_registry()
        .read()
        .map(|registry| registry.clone())
        .map_err(|_| CoreError::lock_error(GLOBAL_REGISTRY_RESOURCE))
}

/// Swap the process-wide registry, returning the previous one
pub fn replace_registry(registry: ModuleRegistry) -> Result<ModuleRegistry, CoreError> {
    let mut guard = global_registry()
        .write()
        .map_err(|_| CoreError::lock_error(GLOBAL_REGISTRY_RESOURCE))?;
    Ok(std::mem::replace(&mut *guard, registry))
}

/// Clear the process-wide registry back to the built-in schemas
pub fn reset_registry() -> Result<(), CoreError> {
    replace_registry(ModuleRegistry::new()).map(|_| ())
}
