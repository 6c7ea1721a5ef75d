use crate::config::app_config::AppConfig;
use crate::container::descriptor::Scope;
use std::collections::HashMap;

/// Interface to implementation choices, global and per module
#[derive(Debug, Clone, Default)]
pub struct BindingSet {
    global: HashMap<String, String>,
    modules: HashMap<String, HashMap<String, String>>,
}

/// A binding that applies to a lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundImplementation<'a> {
    pub implementation: &'a str,
    /// Module whose binding list supplied the choice; `None` for a global binding
    pub module: Option<&'a str>,
}

impl BoundImplementation<'_> {
    /// Where the binding was declared, for error messages
    pub fn location(&self) -> String {
        match self.module {
            Some(module) => format!("module \"{}\"", module),
            None => "global".to_string(),
        }
    }
}

impl BindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the global and per-module bindings of a config
    pub fn from_config(config: &AppConfig) -> Self {
        let mut set = Self::new();
        for binding in &config.bindings {
            set.bind(&binding.interface, &binding.implementation);
        }
        for module in &config.modules {
            for binding in &module.bindings {
                set.bind_in_module(&module.name, &binding.interface, &binding.implementation);
            }
        }
        set
    }

    /// Bind an interface everywhere; a later binding replaces an earlier one
    pub fn bind(&mut self, interface: impl Into<String>, implementation: impl Into<String>) {
        self.global.insert(interface.into(), implementation.into());
    }

    /// Bind an interface for lookups made inside one module
    pub fn bind_in_module(
        &mut self,
        module: impl Into<String>,
        interface: impl Into<String>,
        implementation: impl Into<String>,
    ) {
        self.modules
            .entry(module.into())
            .or_default()
            .insert(interface.into(), implementation.into());
    }

    /// Apply every binding of `other` on top of this set
    pub fn merge(&mut self, other: &BindingSet) {
        for (interface, implementation) in &other.global {
            self.bind(interface, implementation);
        }
        for (module, bindings) in &other.modules {
            for (interface, implementation) in bindings {
                self.bind_in_module(module, interface, implementation);
            }
        }
    }

    /// Find the binding for `interface` seen from `scope`: module bindings first, then global
    pub fn lookup(&self, scope: &Scope, interface: &str) -> Option<BoundImplementation<'_>> {
        if let Some(key) = scope.module() {
            if let Some((module, bindings)) = self.modules.get_key_value(key.name()) {
                if let Some(implementation) = bindings.get(interface) {
                    return Some(BoundImplementation {
                        implementation: implementation.as_str(),
                        module: Some(module.as_str()),
                    });
                }
            }
        }

        self.global.get(interface).map(|implementation| BoundImplementation {
            implementation: implementation.as_str(),
            module: None,
        })
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.modules.values().map(HashMap::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
