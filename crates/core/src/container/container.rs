use crate::config::app_config::AppConfig;
use crate::container::binding::BindingSet;
use crate::container::descriptor::{ModuleKey, Scope};
use crate::container::graph::{Plan, Planner, ProviderEntry, ProviderIndex};
use crate::container::outputs::{OutputSlot, ResolvedOutput};
use crate::errors::CoreError;
use crate::modules::registry::ModuleRegistry;
use crate::modules::resolver::{resolve_modules, ResolvedModule};
use crate::providers::context::{AnyValue, ProviderContext};
use crate::providers::provider::{OutputKind, Provider};
use uuid::Uuid;

/// A provider supplied by the host, optionally placed inside a module
#[derive(Debug, Clone)]
pub(crate) struct HostProvider {
    pub module: Option<String>,
    pub provider: Provider,
}

/// One provider invocation performed during a run
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub provider: String,
    pub scope: Scope,
}

/// What a successful run did
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Configured module names in config order
    pub modules: Vec<String>,
    /// Provider invocations in execution order
    pub invocations: Vec<Invocation>,
}

impl RunReport {
    /// Names of the invoked providers, in execution order
    pub fn invoked_providers(&self) -> Vec<&str> {
        self.invocations.iter().map(|i| i.provider.as_str()).collect()
    }

    /// Number of times the named provider ran
    pub fn invocation_count(&self, provider: &str) -> usize {
        self.invocations.iter().filter(|i| i.provider == provider).count()
    }
}

/// Composition container: a config, a module registry, host providers and bindings.
///
/// Every call to [`Container::inject`] is an independent resolution run with its
/// own module keys and its own instances.
#[derive(Debug, Clone)]
pub struct Container {
    config: AppConfig,
    registry: ModuleRegistry,
    host_providers: Vec<HostProvider>,
    host_bindings: BindingSet,
}

impl Container {
    pub(crate) fn new(
        config: AppConfig,
        registry: ModuleRegistry,
        host_providers: Vec<HostProvider>,
        host_bindings: BindingSet,
    ) -> Self {
        Self {
            config,
            registry,
            host_providers,
            host_bindings,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Resolve the graph, run every needed provider and fill `outputs`
    pub fn inject(&self, outputs: &mut [&mut dyn OutputSlot]) -> Result<RunReport, CoreError> {
        let run_id = Uuid::new_v4();
        tracing::info!("Starting resolution run {}", run_id);

        let modules = resolve_modules(&self.config, &self.registry, run_id)?;

        let mut bindings = BindingSet::from_config(&self.config);
        bindings.merge(&self.host_bindings);

        let index = ProviderIndex::build(self.provider_entries(&modules, run_id))?;
        let requirements: Vec<_> = outputs.iter().map(|slot| slot.requirement()).collect();
        let plan = Planner::new(&index, &bindings).plan(&requirements)?;

        let invocations = self.execute(&index, &plan, outputs)?;

        tracing::info!(
            "Resolution run {} completed: {} modules, {} provider invocations",
            run_id,
            modules.len(),
            invocations.len()
        );

        Ok(RunReport {
            run_id,
            modules: modules.iter().map(|m| m.name().to_string()).collect(),
            invocations,
        })
    }

    /// Providers of the run: per module its config value, providers and invokers,
    /// then the host providers
    fn provider_entries(&self, modules: &[ResolvedModule], run_id: Uuid) -> Vec<ProviderEntry> {
        let mut entries = Vec::new();

        for module in modules {
            let owner = Some(module.key.clone());
            let config = Provider::supply_value(
                format!("config({})", module.name()),
                module.initializer.schema().tag.clone(),
                OutputKind::ModuleLocal,
                module.config.clone(),
            );
            entries.push(ProviderEntry::new(config, owner.clone()));

            for provider in module.initializer.providers() {
                entries.push(ProviderEntry::new(provider.clone(), owner.clone()));
            }
            for invoker in module.initializer.invokers() {
                entries.push(ProviderEntry::new(invoker.clone(), owner.clone()));
            }
        }

        for host in &self.host_providers {
            let owner = host.module.as_deref().map(|name| {
                modules
                    .iter()
                    .find(|m| m.name() == name)
                    .map(|m| m.key.clone())
                    .unwrap_or_else(|| ModuleKey::new(name, run_id))
            });
            entries.push(ProviderEntry::new(host.provider.clone(), owner));
        }

        entries
    }

    fn execute(
        &self,
        index: &ProviderIndex,
        plan: &Plan,
        outputs: &mut [&mut dyn OutputSlot],
    ) -> Result<Vec<Invocation>, CoreError> {
        let order = plan.graph.topological_sort()?;
        let mut produced: Vec<Option<Vec<AnyValue>>> = vec![None; plan.nodes.len()];
        let mut invocations = Vec::with_capacity(order.len());

        for node_id in order {
            let node = &plan.nodes[node_id];
            let provider = &index.entry(node.entry).provider;

            let values = node
                .inputs
                .iter()
                .map(|input| input.materialize(&produced))
                .collect::<Result<Vec<_>, _>>()?;

            tracing::debug!("Invoking {}", plan.graph.label(node_id));

            let mut ctx = ProviderContext::new(provider.name(), provider.inputs(), values, provider.outputs());
            provider.call(&mut ctx).map_err(|source| CoreError::ProviderFailed {
                provider: provider.name().to_string(),
                type_name: provider
                    .outputs()
                    .first()
                    .map(|o| o.tag.to_string())
                    .unwrap_or_else(|| "invoker".to_string()),
                scope: node.scope.to_string(),
                source,
            })?;

            produced[node_id] = Some(ctx.into_outputs()?);
            invocations.push(Invocation {
                provider: provider.name().to_string(),
                scope: node.scope.clone(),
            });
        }

        for (slot, source) in outputs.iter_mut().zip(&plan.outputs) {
            slot.fill(ResolvedOutput::new(source.materialize(&produced)?))?;
        }

        Ok(invocations)
    }
}
