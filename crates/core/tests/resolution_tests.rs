//! Graph resolution: module-scoped values, module config inputs, invokers,
//! collections and the failure modes of a run.

use appwire_core::container::{ContainerBuilder, ManySlot, ModuleKey, ModuleMapSlot, Scope, Slot};
use appwire_core::{
    load_yaml, AppConfig, ConfigSchema, CoreError, ModuleDescriptor, ModuleInitializer, ModuleRegistry, Provider,
};
use lazy_static::lazy_static;
use serde::Deserialize;
use std::error::Error;
use std::sync::Mutex;

lazy_static! {
    static ref INVOKER_LOG: Mutex<Vec<String>> = Mutex::new(Vec::new());
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct BankModule {
    denom: String,
}

impl ConfigSchema for BankModule {
    const TYPE_URL: &'static str = "example.bank.v1.Module";

    fn module_descriptor() -> Option<ModuleDescriptor> {
        Some(ModuleDescriptor::new("example.com/x/bank"))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct AuditModule {}

impl ConfigSchema for AuditModule {
    const TYPE_URL: &'static str = "example.audit.v1.Module";

    fn module_descriptor() -> Option<ModuleDescriptor> {
        Some(ModuleDescriptor::new("example.com/x/audit"))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Denom(String);

#[derive(Debug, Clone, PartialEq)]
struct Owner(ModuleKey);

#[derive(Debug, Clone, PartialEq)]
struct Route(String);

fn bank_initializer() -> ModuleInitializer {
    ModuleInitializer::new::<BankModule>()
        .provide(
            Provider::builder("provide_denom")
                .input::<BankModule>()
                .output::<Denom>()
                .build(|ctx| {
                    let config: BankModule = ctx.get()?;
                    ctx.provide(Denom(config.denom))?;
                    Ok(())
                }),
        )
        .provide(
            Provider::builder("provide_owner")
                .own_module_key()
                .output::<Owner>()
                .build(|ctx| {
                    let key = ctx.own_module_key()?;
                    ctx.provide(Owner(key))?;
                    Ok(())
                }),
        )
        .provide(
            Provider::builder("bank_routes")
                .many_output::<Route>()
                .build(|ctx| {
                    ctx.provide(Route("/bank".to_string()))?;
                    Ok(())
                }),
        )
}

fn registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register(bank_initializer()).unwrap();
    registry
        .register(
            ModuleInitializer::new::<AuditModule>()
                .provide(
                    Provider::builder("audit_routes")
                        .many_output::<Route>()
                        .build(|ctx| {
                            ctx.provide(Route("/audit".to_string()))?;
                            Ok(())
                        }),
                )
                .invoke(
                    Provider::builder("audit_start")
                        .own_module_key()
                        .optional::<Denom>()
                        .build(|ctx| {
                            let key = ctx.own_module_key()?;
                            let denom: Option<Denom> = ctx.optional()?;
                            INVOKER_LOG
                                .lock()
                                .map_err(|_| CoreError::lock_error("invoker log"))?
                                .push(format!("{}:{:?}", key.name(), denom.map(|d| d.0)));
                            Ok(())
                        }),
                ),
        )
        .unwrap();
    registry
}

fn config(yaml: &str) -> AppConfig {
    load_yaml(yaml.as_bytes()).unwrap()
}

const BANK: &str = r#"
modules:
- name: bank
  config:
    "@type": example.bank.v1.Module
    denom: stake
"#;

#[test]
fn test_module_config_is_a_module_local_input() {
    let mut denom = Slot::<Denom>::new();
    ContainerBuilder::new()
        .registry(registry())
        .config(config(BANK))
        .inject(&mut [&mut denom])
        .unwrap();

    assert_eq!(denom.get(), Some(&Denom("stake".to_string())));
}

#[test]
fn test_module_config_is_not_visible_at_top_level() {
    let mut bank_config = Slot::<BankModule>::new();
    let err = ContainerBuilder::new()
        .registry(registry())
        .config(config(BANK))
        .inject(&mut [&mut bank_config])
        .unwrap_err();

    assert!(matches!(err, CoreError::MissingOutput { .. }));
}

#[test]
fn test_module_keys_are_fresh_per_run() {
    let container = ContainerBuilder::new()
        .registry(registry())
        .config(config(BANK))
        .build()
        .unwrap();

    let mut first = Slot::<Owner>::new();
    container.inject(&mut [&mut first]).unwrap();
    let mut second = Slot::<Owner>::new();
    container.inject(&mut [&mut second]).unwrap();

    let first = first.into_inner().unwrap().0;
    let second = second.into_inner().unwrap().0;
    assert_eq!(first.name(), "bank");
    assert_eq!(second.name(), "bank");
    assert_ne!(first, second);
}

#[test]
fn test_many_outputs_follow_config_order() {
    let yaml = r#"
modules:
- name: audit
  config:
    "@type": example.audit.v1.Module
- name: bank
  config:
    "@type": example.bank.v1.Module
"#;

    let mut routes = ManySlot::<Route>::new();
    ContainerBuilder::new()
        .registry(registry())
        .config(config(yaml))
        .inject(&mut [&mut routes])
        .unwrap();

    assert_eq!(
        routes.get().unwrap(),
        &[Route("/audit".to_string()), Route("/bank".to_string())]
    );
}

#[test]
fn test_invokers_run_without_requested_outputs() {
    let yaml = r#"
modules:
- name: bank
  config:
    "@type": example.bank.v1.Module
    denom: uatom
- name: audit
  config:
    "@type": example.audit.v1.Module
"#;

    let report = ContainerBuilder::new()
        .registry(registry())
        .config(config(yaml))
        .inject(&mut [])
        .unwrap();

    // bank's denom is a container-wide single, so the audit invoker sees it
    let log = INVOKER_LOG.lock().unwrap().clone();
    assert!(log.contains(&"audit:Some(\"uatom\")".to_string()), "log: {:?}", log);
    assert_eq!(report.invoked_providers().last(), Some(&"audit_start"));
    assert_eq!(report.invocation_count("audit_start"), 1);
    assert_eq!(report.invocation_count("provide_denom"), 1);

    let start = report
        .invocations
        .iter()
        .find(|i| i.provider == "audit_start")
        .unwrap();
    assert_eq!(start.scope.module().map(ModuleKey::name), Some("audit"));
}

#[test]
fn test_optional_input_may_be_absent() {
    let yaml = r#"
modules:
- name: audit
  config:
    "@type": example.audit.v1.Module
"#;

    ContainerBuilder::new()
        .registry(registry())
        .config(config(yaml))
        .inject(&mut [])
        .unwrap();

    let log = INVOKER_LOG.lock().unwrap().clone();
    assert!(log.contains(&"audit:None".to_string()), "log: {:?}", log);
}

#[test]
fn test_module_scoped_provider_requires_a_module() {
    let mut key = Slot::<String>::new();
    let err = ContainerBuilder::new()
        .registry(ModuleRegistry::new())
        .provide(
            Provider::builder("scoped_name")
                .module_key()
                .output::<String>()
                .build(|ctx| {
                    let key = ctx.module_key()?;
                    ctx.provide(key.name().to_string())?;
                    Ok(())
                }),
        )
        .inject(&mut [&mut key])
        .unwrap_err();

    assert!(matches!(err, CoreError::ModuleScopeRequired { .. }));
}

#[test]
fn test_module_scoped_provider_in_host_module() {
    #[derive(Debug, Clone, PartialEq)]
    struct Greeting(String);

    let mut greeting = Slot::<Greeting>::new();
    ContainerBuilder::new()
        .registry(registry())
        .config(config(BANK))
        .provide(
            Provider::builder("scoped_name")
                .module_key()
                .output::<String>()
                .build(|ctx| {
                    let key = ctx.module_key()?;
                    ctx.provide(format!("hello from {}", key.name()))?;
                    Ok(())
                }),
        )
        .provide_in_module(
            "bank",
            Provider::builder("bank_greeting")
                .input::<String>()
                .output::<Greeting>()
                .build(|ctx| {
                    let text: String = ctx.get()?;
                    ctx.provide(Greeting(text))?;
                    Ok(())
                }),
        )
        .inject(&mut [&mut greeting])
        .unwrap();

    assert_eq!(greeting.get(), Some(&Greeting("hello from bank".to_string())));
}

#[test]
fn test_circular_dependency_is_reported() {
    #[derive(Clone)]
    struct A;
    #[derive(Clone)]
    struct B;

    let mut a = Slot::<A>::new();
    let err = ContainerBuilder::new()
        .registry(ModuleRegistry::new())
        .provide(Provider::builder("provide_a").input::<B>().output::<A>().build(|_| Ok(())))
        .provide(Provider::builder("provide_b").input::<A>().output::<B>().build(|_| Ok(())))
        .inject(&mut [&mut a])
        .unwrap_err();

    assert!(err.is_cycle());
    let message = err.to_string();
    assert!(message.contains("provide_a"));
    assert!(message.contains("provide_b"));
    assert!(message.contains(" -> "));
}

#[test]
fn test_missing_dependency_names_consumer() {
    #[derive(Clone)]
    struct Needs;

    let mut needs = Slot::<Needs>::new();
    let err = ContainerBuilder::new()
        .registry(ModuleRegistry::new())
        .provide(
            Provider::builder("provide_needs")
                .input::<u64>()
                .output::<Needs>()
                .build(|_| Ok(())),
        )
        .inject(&mut [&mut needs])
        .unwrap_err();

    assert!(matches!(err, CoreError::MissingDependency { .. }));
    assert!(err.to_string().contains("required by provide_needs"));
}

#[test]
fn test_requested_output_never_provided() {
    let mut missing = Slot::<u8>::new();
    let err = ContainerBuilder::new()
        .registry(ModuleRegistry::new())
        .inject(&mut [&mut missing])
        .unwrap_err();

    assert_eq!(err.to_string(), "requested output u8 was never provided");
}

#[test]
fn test_requested_collections_never_provided() {
    #[derive(Debug, Clone)]
    struct NeverProduced;

    let mut by_module = ModuleMapSlot::<NeverProduced>::new();
    let err = ContainerBuilder::new()
        .registry(registry())
        .config(config(BANK))
        .inject(&mut [&mut by_module])
        .unwrap_err();
    assert!(matches!(err, CoreError::MissingOutput { .. }));
    assert!(err.to_string().contains("NeverProduced"));
    assert!(by_module.get().is_none());

    let mut all = ManySlot::<NeverProduced>::new();
    let err = ContainerBuilder::new()
        .registry(ModuleRegistry::new())
        .inject(&mut [&mut all])
        .unwrap_err();
    assert!(matches!(err, CoreError::MissingOutput { .. }));
    assert!(all.get().is_none());
}

#[test]
fn test_collection_inputs_may_be_empty() {
    #[derive(Debug, Clone)]
    struct Plugin;

    let mut count = Slot::<usize>::new();
    ContainerBuilder::new()
        .registry(ModuleRegistry::new())
        .provide(
            Provider::builder("count_plugins")
                .many::<Plugin>()
                .output::<usize>()
                .build(|ctx| {
                    let plugins: Vec<Plugin> = ctx.many()?;
                    ctx.provide(plugins.len())?;
                    Ok(())
                }),
        )
        .inject(&mut [&mut count])
        .unwrap();

    assert_eq!(count.get(), Some(&0));
}

#[test]
fn test_provider_failure_keeps_source() {
    let mut value = Slot::<u32>::new();
    let err = ContainerBuilder::new()
        .registry(registry())
        .config(config(BANK))
        .provide(Provider::builder("failing").output::<u32>().build(|_| {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk unavailable").into())
        }))
        .inject(&mut [&mut value])
        .unwrap_err();

    match &err {
        CoreError::ProviderFailed { provider, scope, .. } => {
            assert_eq!(provider, "failing");
            assert_eq!(scope, "global scope");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(err.to_string().contains("disk unavailable"));
    assert!(err.source().is_some());
}

#[test]
fn test_declared_output_must_be_provided() {
    let mut value = Slot::<u32>::new();
    let err = ContainerBuilder::new()
        .registry(ModuleRegistry::new())
        .provide(Provider::builder("lazy").output::<u32>().build(|_| Ok(())))
        .inject(&mut [&mut value])
        .unwrap_err();

    assert!(err.to_string().contains("declared output u32 was never provided"));
}

#[test]
fn test_config_decode_failure_names_module() {
    let yaml = r#"
modules:
- name: bank
  config:
    "@type": example.bank.v1.Module
    denom: [1, 2]
"#;

    let err = ContainerBuilder::new()
        .registry(registry())
        .config(config(yaml))
        .inject(&mut [])
        .unwrap_err();

    assert!(err.is_config());
    assert!(err.to_string().contains("module \"bank\""));
}

#[test]
fn test_duplicate_module_names_rejected() {
    let err = load_yaml(
        br#"
modules:
- name: bank
  config:
    "@type": example.bank.v1.Module
- name: bank
  config:
    "@type": example.bank.v1.Module
"#,
    )
    .unwrap_err();

    assert_eq!(err.to_string(), "duplicate module name \"bank\"");
}

#[test]
fn test_module_scope_display_in_invocations() {
    let mut owner = Slot::<Owner>::new();
    let report = ContainerBuilder::new()
        .registry(registry())
        .config(config(BANK))
        .inject(&mut [&mut owner])
        .unwrap();

    let invocation = &report.invocations[0];
    assert_eq!(invocation.provider, "provide_owner");
    assert!(matches!(&invocation.scope, Scope::Module(key) if key.name() == "bank"));
}
