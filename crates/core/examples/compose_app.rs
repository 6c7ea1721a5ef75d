//! Example: composing an app from a YAML config
//!
//! Two modules share a runtime-owned store registry through a module-scoped
//! provider, publish handlers one per module, and a binding picks which
//! greeter implementation the app uses.
//!
//! Run with `RUST_LOG=debug` to see the resolution trace.

use appwire_core::container::{ModuleMap, TypeTag};
use appwire_core::{
    inject, load_yaml, register_module, ConfigSchema, CoreError, ModuleDescriptor, ModuleInitializer, Provider, RunReport,
    Slot,
};
use serde::Deserialize;
use std::sync::{Arc, Mutex};

const GREETER: &str = "demo.Greeter";

const APP_YAML: &str = r#"
bindings:
- interfaceType: demo.Greeter
  implementation: demo.LoudGreeter
modules:
- name: runtime
  config:
    "@type": demo.runtime.v1.Module
    app_name: composed
- name: bank
  config:
    "@type": demo.bank.v1.Module
    denom: stake
- name: staking
  config:
    "@type": demo.staking.v1.Module
    bond_denom: stake
"#;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RuntimeModule {
    app_name: String,
}

impl ConfigSchema for RuntimeModule {
    const TYPE_URL: &'static str = "demo.runtime.v1.Module";

    fn module_descriptor() -> Option<ModuleDescriptor> {
        Some(ModuleDescriptor::new("demo.dev/runtime"))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct BankModule {
    denom: String,
}

impl ConfigSchema for BankModule {
    const TYPE_URL: &'static str = "demo.bank.v1.Module";

    fn module_descriptor() -> Option<ModuleDescriptor> {
        Some(ModuleDescriptor::new("demo.dev/bank"))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct StakingModule {
    bond_denom: String,
}

impl ConfigSchema for StakingModule {
    const TYPE_URL: &'static str = "demo.staking.v1.Module";

    fn module_descriptor() -> Option<ModuleDescriptor> {
        Some(ModuleDescriptor::new("demo.dev/staking"))
    }
}

/// Store names handed out by the runtime, in allocation order
#[derive(Debug, Clone, Default)]
struct StoreRegistry(Arc<Mutex<Vec<String>>>);

#[derive(Debug, Clone)]
struct StoreKey(String);

#[derive(Clone)]
struct Handler(Arc<dyn Fn() -> String + Send + Sync>);

trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> String;
}

type SharedGreeter = Arc<dyn Greeter>;

struct PlainGreeter;
struct LoudGreeter;

impl Greeter for PlainGreeter {
    fn greet(&self, name: &str) -> String {
        format!("welcome to {}", name)
    }
}

impl Greeter for LoudGreeter {
    fn greet(&self, name: &str) -> String {
        format!("WELCOME TO {}!", name.to_uppercase())
    }
}

#[derive(Clone)]
struct App {
    banner: String,
    stores: Vec<String>,
    handlers: ModuleMap<Handler>,
}

fn greeter_tag() -> TypeTag {
    TypeTag::named::<SharedGreeter>(GREETER)
}

fn runtime_module() -> ModuleInitializer {
    ModuleInitializer::new::<RuntimeModule>()
        .provide(
            Provider::builder("provide_store_registry")
                .output::<StoreRegistry>()
                .build(|ctx| {
                    ctx.provide(StoreRegistry::default())?;
                    Ok(())
                }),
        )
        .provide(
            Provider::builder("provide_store_key")
                .module_key()
                .input::<StoreRegistry>()
                .output::<StoreKey>()
                .build(|ctx| {
                    let key = ctx.module_key()?;
                    let registry: StoreRegistry = ctx.get()?;
                    registry
                        .0
                        .lock()
                        .map_err(|_| CoreError::lock_error("store registry"))?
                        .push(key.name().to_string());
                    ctx.provide(StoreKey(key.name().to_string()))?;
                    Ok(())
                }),
        )
        .provide(
            Provider::builder("provide_plain_greeter")
                .output_tagged(greeter_tag(), "demo.PlainGreeter")
                .build(|ctx| {
                    ctx.provide_tagged::<SharedGreeter>(GREETER, Arc::new(PlainGreeter))?;
                    Ok(())
                }),
        )
        .provide(
            Provider::builder("provide_loud_greeter")
                .output_tagged(greeter_tag(), "demo.LoudGreeter")
                .build(|ctx| {
                    ctx.provide_tagged::<SharedGreeter>(GREETER, Arc::new(LoudGreeter))?;
                    Ok(())
                }),
        )
        .provide(
            Provider::builder("provide_app")
                .input::<RuntimeModule>()
                .input::<StoreRegistry>()
                .input_tagged(greeter_tag())
                .one_per_module::<Handler>()
                .output::<App>()
                .build(|ctx| {
                    let config: RuntimeModule = ctx.get()?;
                    let registry: StoreRegistry = ctx.get()?;
                    let greeter: SharedGreeter = ctx.get_tagged(GREETER)?;
                    let handlers = ctx.module_map::<Handler>()?;
                    let stores = registry
                        .0
                        .lock()
                        .map_err(|_| CoreError::lock_error("store registry"))?
                        .clone();
                    ctx.provide(App {
                        banner: greeter.greet(&config.app_name),
                        stores,
                        handlers,
                    })?;
                    Ok(())
                }),
        )
}

fn bank_module() -> ModuleInitializer {
    ModuleInitializer::new::<BankModule>().provide(
        Provider::builder("provide_bank_handler")
            .input::<BankModule>()
            .input::<StoreKey>()
            .collect::<Handler>()
            .build(|ctx| {
                let config: BankModule = ctx.get()?;
                let store: StoreKey = ctx.get()?;
                ctx.provide(Handler(Arc::new(move || {
                    format!("bank balances in {} (store {})", config.denom, store.0)
                })))?;
                Ok(())
            }),
    )
}

fn staking_module() -> ModuleInitializer {
    ModuleInitializer::new::<StakingModule>().provide(
        Provider::builder("provide_staking_handler")
            .input::<StakingModule>()
            .input::<StoreKey>()
            .collect::<Handler>()
            .build(|ctx| {
                let config: StakingModule = ctx.get()?;
                let store: StoreKey = ctx.get()?;
                ctx.provide(Handler(Arc::new(move || {
                    format!("bonding {} (store {})", config.bond_denom, store.0)
                })))?;
                Ok(())
            }),
    )
}

/// Register the demo modules and resolve `APP_YAML` into an `App`
fn compose() -> Result<(App, RunReport), Box<dyn std::error::Error>> {
    register_module(runtime_module())?;
    register_module(bank_module())?;
    register_module(staking_module())?;

    let config = load_yaml(APP_YAML.as_bytes())?;
    let mut app = Slot::<App>::new();
    let report = inject(config, &mut [&mut app])?;

    let app = app.into_inner().ok_or("app was not provided")?;
    Ok((app, report))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (app, report) = compose()?;
    println!("{}", app.banner);
    println!("stores: {}", app.stores.join(", "));
    for (module, handler) in &app.handlers {
        println!("{}: {}", module, (handler.0)());
    }
    println!(
        "run {} invoked {} providers across {} modules",
        report.run_id,
        report.invocations.len(),
        report.modules.len()
    );

    Ok(())
}
