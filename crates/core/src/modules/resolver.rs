use crate::config::app_config::{AppConfig, Binding, ModuleConfigEntry};
use crate::container::descriptor::ModuleKey;
use crate::errors::CoreError;
use crate::modules::registry::{ModuleInitializer, ModuleRegistry};
use crate::providers::context::AnyValue;
use uuid::Uuid;

/// A config entry matched to its registered initializer and decoded config
#[derive(Debug, Clone)]
pub struct ResolvedModule {
    pub key: ModuleKey,
    pub initializer: ModuleInitializer,
    pub config: AnyValue,
    pub bindings: Vec<Binding>,
}

impl ResolvedModule {
    pub fn name(&self) -> &str {
        self.key.name()
    }
}

/// Match every module entry of `config` to an initializer in `registry`.
///
/// Module keys are allocated for `run_id`, in config order.
pub fn resolve_modules(
    config: &AppConfig,
    registry: &ModuleRegistry,
    run_id: Uuid,
) -> Result<Vec<ResolvedModule>, CoreError> {
    config.validate()?;
    registry.validate()?;

    let mut resolved = Vec::with_capacity(config.modules.len());
    for entry in &config.modules {
        resolved.push(resolve_entry(entry, registry, run_id)?);
    }

    tracing::info!("Resolved {} modules from app config", resolved.len());
    Ok(resolved)
}

fn resolve_entry(
    entry: &ModuleConfigEntry,
    registry: &ModuleRegistry,
    run_id: Uuid,
) -> Result<ResolvedModule, CoreError> {
    let type_url = entry.config.type_url.as_str();

    let schema = registry.schema(type_url).ok_or_else(|| CoreError::UnknownConfigType {
        type_url: type_url.to_string(),
    })?;

    let descriptor = schema.descriptor.as_ref().ok_or_else(|| CoreError::NotAModuleConfig {
        module: entry.name.clone(),
        type_url: type_url.to_string(),
        registered: registry.registered_modules(),
    })?;

    let initializer = registry.lookup(type_url).ok_or_else(|| CoreError::ModuleNotRegistered {
        module: entry.name.clone(),
        type_url: type_url.to_string(),
        import_path: descriptor.import_path.clone(),
        registered: registry.registered_modules(),
    })?;

    let config = initializer.decode(&entry.name, &entry.config.value)?;

    tracing::debug!("Resolved module {} with config type {}", entry.name, type_url);

    Ok(ResolvedModule {
        key: ModuleKey::new(&entry.name, run_id),
        initializer: initializer.clone(),
        config,
        bindings: entry.bindings.clone(),
    })
}
