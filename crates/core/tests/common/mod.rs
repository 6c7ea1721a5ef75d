//! Test modules shared by the integration tests: a runtime module that hands out
//! per-module store keys and assembles an app from every module's handler, and
//! two modules contributing handlers.

#![allow(dead_code)]

use appwire_core::container::ModuleMap;
use appwire_core::modules::{register_module, register_schema, reset_registry};
use appwire_core::{ConfigSchema, CoreError, ModuleDescriptor, ModuleInitializer, Provider};
use serde::Deserialize;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex};

pub const TESTPB_IMPORT: &str = "appwire.dev/core/internal/testpb";

fn testpb() -> Option<ModuleDescriptor> {
    Some(ModuleDescriptor::new(TESTPB_IMPORT))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TestRuntimeModule {}

impl ConfigSchema for TestRuntimeModule {
    const TYPE_URL: &'static str = "testpb.TestRuntimeModule";

    fn module_descriptor() -> Option<ModuleDescriptor> {
        testpb()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TestModuleA {}

impl ConfigSchema for TestModuleA {
    const TYPE_URL: &'static str = "testpb.TestModuleA";

    fn module_descriptor() -> Option<ModuleDescriptor> {
        testpb()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TestModuleB {}

impl ConfigSchema for TestModuleB {
    const TYPE_URL: &'static str = "testpb.TestModuleB";

    fn module_descriptor() -> Option<ModuleDescriptor> {
        testpb()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TestUnregisteredModule {}

impl ConfigSchema for TestUnregisteredModule {
    const TYPE_URL: &'static str = "testpb.TestUnregisteredModule";

    fn module_descriptor() -> Option<ModuleDescriptor> {
        testpb()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TestNoModuleOptionModule {}

impl ConfigSchema for TestNoModuleOptionModule {
    const TYPE_URL: &'static str = "testpb.TestNoModuleOptionModule";
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TestNoImportModule {}

impl ConfigSchema for TestNoImportModule {
    const TYPE_URL: &'static str = "testpb.TestNoImportModule";

    fn module_descriptor() -> Option<ModuleDescriptor> {
        Some(ModuleDescriptor::new(""))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreKey {
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeState {
    store_keys: Arc<Mutex<Vec<StoreKey>>>,
}

#[derive(Clone)]
pub struct Handler {
    pub do_something: Arc<dyn Fn() -> String + Send + Sync>,
}

#[derive(Clone)]
pub struct App(Arc<dyn Fn(&mut dyn fmt::Write) -> fmt::Result + Send + Sync>);

impl App {
    pub fn run(&self) -> String {
        let mut out = String::new();
        (self.0)(&mut out).unwrap();
        out
    }
}

pub trait KeeperA: Send + Sync {
    fn store_key(&self) -> &StoreKey;
}

pub trait KeeperB: Send + Sync {
    fn keeper_a(&self) -> &SharedKeeperA;
}

pub type SharedKeeperA = Arc<dyn KeeperA>;
pub type SharedKeeperB = Arc<dyn KeeperB>;

struct KeeperAImpl {
    key: StoreKey,
}

impl KeeperA for KeeperAImpl {
    fn store_key(&self) -> &StoreKey {
        &self.key
    }
}

struct KeeperBImpl {
    key: StoreKey,
    a: SharedKeeperA,
}

impl KeeperB for KeeperBImpl {
    fn keeper_a(&self) -> &SharedKeeperA {
        &self.a
    }
}

pub fn provide_runtime_state() -> Provider {
    Provider::builder("provide_runtime_state")
        .output::<RuntimeState>()
        .build(|ctx| {
            ctx.provide(RuntimeState::default())?;
            Ok(())
        })
}

pub fn provide_store_key() -> Provider {
    Provider::builder("provide_store_key")
        .module_key()
        .input::<RuntimeState>()
        .output::<StoreKey>()
        .build(|ctx| {
            let key = ctx.module_key()?;
            let state: RuntimeState = ctx.get()?;
            let store_key = StoreKey {
                name: key.name().to_string(),
            };
            state
                .store_keys
                .lock()
                .map_err(|_| CoreError::lock_error("runtime state"))?
                .push(store_key.clone());
            ctx.provide(store_key)?;
            Ok(())
        })
}

pub fn provide_app() -> Provider {
    Provider::builder("provide_app")
        .input::<RuntimeState>()
        .one_per_module::<Handler>()
        .output::<App>()
        .build(|ctx| {
            let state: RuntimeState = ctx.get()?;
            let handlers: ModuleMap<Handler> = ctx.module_map()?;

            ctx.provide(App(Arc::new(move |w: &mut dyn fmt::Write| -> fmt::Result {
                let mut keys = state.store_keys.lock().map_err(|_| fmt::Error)?.clone();
                keys.sort_by(|a, b| a.name.cmp(&b.name));
                for key in &keys {
                    writeln!(w, "got store key {}", key.name)?;
                }

                for (name, handler) in &handlers {
                    writeln!(w, "running module handler {}", name)?;
                    writeln!(w, "result: {}", (handler.do_something)())?;
                }
                Ok(())
            })))?;
            Ok(())
        })
}

pub fn provide_module_a() -> Provider {
    Provider::builder("provide_module_a")
        .input::<StoreKey>()
        .output::<SharedKeeperA>()
        .collect::<Handler>()
        .build(|ctx| {
            let key: StoreKey = ctx.get()?;
            ctx.provide::<SharedKeeperA>(Arc::new(KeeperAImpl { key }))?;
            ctx.provide(Handler {
                do_something: Arc::new(|| "hello".to_string()),
            })?;
            Ok(())
        })
}

pub fn provide_module_b() -> Provider {
    Provider::builder("provide_module_b")
        .input::<StoreKey>()
        .input::<SharedKeeperA>()
        .output::<SharedKeeperB>()
        .collect::<Handler>()
        .build(|ctx| {
            let key: StoreKey = ctx.get()?;
            let a: SharedKeeperA = ctx.get()?;
            ctx.provide::<SharedKeeperB>(Arc::new(KeeperBImpl { key, a }))?;
            ctx.provide(Handler {
                do_something: Arc::new(|| "goodbye".to_string()),
            })?;
            Ok(())
        })
}

/// Reset the process-wide registry and register the test modules
pub fn register_test_modules() {
    reset_registry().unwrap();

    register_module(
        ModuleInitializer::new::<TestRuntimeModule>()
            .provide(provide_runtime_state())
            .provide(provide_store_key())
            .provide(provide_app()),
    )
    .unwrap();
    register_module(ModuleInitializer::new::<TestModuleA>().provide(provide_module_a())).unwrap();
    register_module(ModuleInitializer::new::<TestModuleB>().provide(provide_module_b())).unwrap();
    register_schema::<TestUnregisteredModule>().unwrap();
}
