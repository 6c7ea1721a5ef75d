use crate::config::app_config::AppConfig;
use crate::container::binding::BindingSet;
use crate::container::container::{Container, HostProvider, RunReport};
use crate::container::outputs::OutputSlot;
use crate::errors::CoreError;
use crate::modules::registry::{registry_snapshot, ModuleRegistry};
use crate::providers::provider::Provider;

/// Builder for composing a container from an app config, module registry and
/// host-supplied providers
#[derive(Debug, Default)]
pub struct ContainerBuilder {
    config: AppConfig,
    registry: Option<ModuleRegistry>,
    providers: Vec<HostProvider>,
    bindings: BindingSet,
    errors: Vec<CoreError>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a normalized app config
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve against this registry instead of a snapshot of the process-wide one
    pub fn registry(mut self, registry: ModuleRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Add a container-wide provider
    pub fn provide(mut self, provider: Provider) -> Self {
        self.providers.push(HostProvider { module: None, provider });
        self
    }

    /// Add a provider owned by the named module
    pub fn provide_in_module(mut self, module: impl Into<String>, provider: Provider) -> Self {
        self.providers.push(HostProvider {
            module: Some(module.into()),
            provider,
        });
        self
    }

    /// Add an invoker that always runs
    pub fn invoke(mut self, invoker: Provider) -> Self {
        if !invoker.is_invoker() {
            self.errors.push(CoreError::invalid_provider(
                invoker.name(),
                "invokers cannot declare outputs",
            ));
        }
        self.providers.push(HostProvider {
            module: None,
            provider: invoker,
        });
        self
    }

    /// Supply a ready value of type `T`
    pub fn supply<T: Clone + Send + Sync + 'static>(self, value: T) -> Self {
        self.provide(Provider::supply(value))
    }

    /// Choose `implementation` wherever `interface` is ambiguous
    pub fn bind(mut self, interface: impl Into<String>, implementation: impl Into<String>) -> Self {
        self.bindings.bind(interface, implementation);
        self
    }

    /// Choose `implementation` for lookups made inside `module`
    pub fn bind_in_module(
        mut self,
        module: impl Into<String>,
        interface: impl Into<String>,
        implementation: impl Into<String>,
    ) -> Self {
        self.bindings.bind_in_module(module, interface, implementation);
        self
    }

    /// Build the container
    pub fn build(mut self) -> Result<Container, CoreError> {
        match self.errors.len() {
            0 => {}
            1 => return Err(self.errors.remove(0)),
            count => {
                let messages: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
                return Err(CoreError::provider(format!(
                    "{} container builder errors: {}",
                    count,
                    messages.join("; ")
                )));
            }
        }

        let registry = match self.registry {
            Some(registry) => registry,
            None => registry_snapshot()?,
        };

        Ok(Container::new(self.config, registry, self.providers, self.bindings))
    }

    /// Build the container and run one resolution into `outputs`
    pub fn inject(self, outputs: &mut [&mut dyn OutputSlot]) -> Result<RunReport, CoreError> {
        self.build()?.inject(outputs)
    }
}

/// Resolve `config` against the process-wide registry and fill `outputs`
pub fn inject(config: AppConfig, outputs: &mut [&mut dyn OutputSlot]) -> Result<RunReport, CoreError> {
    ContainerBuilder::new().config(config).inject(outputs)
}
