use crate::container::descriptor::TypeTag;
use crate::errors::CoreError;
use crate::providers::context::{AnyValue, ProviderContext};
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;

/// Result returned by a provider body. Any error type may be propagated with `?`.
pub type ProviderResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Construction function of a provider
pub type ProviderFn = Arc<dyn Fn(&mut ProviderContext<'_>) -> ProviderResult + Send + Sync>;

/// A requirement declared by a provider
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// A single value; `optional` inputs resolve to nothing when unprovided
    Value { tag: TypeTag, optional: bool },
    /// Mapping from module name to the value each module contributed
    OnePerModule(TypeTag),
    /// Every value contributed anywhere in the container, in registration order
    Many(TypeTag),
    /// Key of the module requesting this provider's outputs.
    /// Declaring it makes the provider module-scoped.
    ModuleKey,
    /// Key of the module that registered the provider
    OwnModuleKey,
}

/// How an output participates in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// One value per (type, scope); several candidates need a binding
    Single,
    /// Visible only to providers of the owning module
    ModuleLocal,
    /// Collected into a module-name keyed map
    OnePerModule,
    /// Collected into a list across the whole container
    ManyPerContainer,
}

impl OutputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::Single => "single",
            OutputKind::ModuleLocal => "module-local",
            OutputKind::OnePerModule => "one-per-module",
            OutputKind::ManyPerContainer => "many-per-container",
        }
    }
}

/// A value produced by a provider
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSpec {
    pub tag: TypeTag,
    /// Name matched against the `implementation` side of a binding
    pub implementation: String,
    pub kind: OutputKind,
}

/// A construction step: declared inputs, declared outputs and the function building them
#[derive(Clone)]
pub struct Provider {
    name: Cow<'static, str>,
    inputs: Vec<Input>,
    outputs: Vec<OutputSpec>,
    func: ProviderFn,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish()
    }
}

impl Provider {
    /// Start declaring a provider
    pub fn builder(name: impl Into<Cow<'static, str>>) -> ProviderBuilder {
        ProviderBuilder::new(name)
    }

    /// Provider with no inputs that hands out a ready value
    pub fn supply<T: Clone + Send + Sync + 'static>(value: T) -> Provider {
        let tag = TypeTag::of::<T>();
        Provider::supply_value(format!("supply({})", tag), tag, OutputKind::Single, Arc::new(value))
    }

    pub(crate) fn supply_value(name: String, tag: TypeTag, kind: OutputKind, value: AnyValue) -> Provider {
        let implementation = tag.name().to_string();
        let mut builder = ProviderBuilder::new(name);
        builder.outputs.push(OutputSpec {
            tag,
            implementation,
            kind,
        });
        builder.build(move |ctx| {
            ctx.provide_any(0, value.clone())?;
            Ok(())
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputSpec] {
        &self.outputs
    }

    /// Module-scoped providers run once per consuming module
    pub fn is_module_scoped(&self) -> bool {
        self.inputs.iter().any(|input| matches!(input, Input::ModuleKey))
    }

    /// Providers without outputs are invokers
    pub fn is_invoker(&self) -> bool {
        self.outputs.is_empty()
    }

    pub(crate) fn call(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult {
        (self.func)(ctx)
    }

    /// Check the declaration itself, independent of where it is registered
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut seen = HashSet::new();
        for output in &self.outputs {
            if !seen.insert(output.tag.name()) {
                return Err(CoreError::invalid_provider(
                    self.name(),
                    format!("output {} is declared more than once", output.tag),
                ));
            }
        }

        let key_inputs = self
            .inputs
            .iter()
            .filter(|input| matches!(input, Input::ModuleKey))
            .count();
        if key_inputs > 1 {
            return Err(CoreError::invalid_provider(
                self.name(),
                "ModuleKey input is declared more than once",
            ));
        }

        if self.is_module_scoped() {
            if let Some(output) = self
                .outputs
                .iter()
                .find(|o| matches!(o.kind, OutputKind::OnePerModule | OutputKind::ManyPerContainer))
            {
                return Err(CoreError::invalid_provider(
                    self.name(),
                    format!(
                        "module-scoped providers cannot produce the {} output {}",
                        output.kind.as_str(),
                        output.tag
                    ),
                ));
            }
        }

        Ok(())
    }
}

/// Fluent declaration of a provider
pub struct ProviderBuilder {
    name: Cow<'static, str>,
    inputs: Vec<Input>,
    outputs: Vec<OutputSpec>,
}

impl ProviderBuilder {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Require a value of type `T`
    pub fn input<T: 'static + ?Sized>(self) -> Self {
        self.input_tagged(TypeTag::of::<T>())
    }

    /// Require a value by tag
    pub fn input_tagged(mut self, tag: TypeTag) -> Self {
        self.inputs.push(Input::Value { tag, optional: false });
        self
    }

    /// Accept a value of type `T` if anything provides it
    pub fn optional<T: 'static + ?Sized>(mut self) -> Self {
        self.inputs.push(Input::Value {
            tag: TypeTag::of::<T>(),
            optional: true,
        });
        self
    }

    /// Require the module-name keyed map of every module's `T`
    pub fn one_per_module<T: 'static + ?Sized>(mut self) -> Self {
        self.inputs.push(Input::OnePerModule(TypeTag::of::<T>()));
        self
    }

    /// Require every `T` contributed in the container
    pub fn many<T: 'static + ?Sized>(mut self) -> Self {
        self.inputs.push(Input::Many(TypeTag::of::<T>()));
        self
    }

    /// Require the consuming module's key; the provider becomes module-scoped
    pub fn module_key(mut self) -> Self {
        self.inputs.push(Input::ModuleKey);
        self
    }

    /// Require the key of the module that registered this provider
    pub fn own_module_key(mut self) -> Self {
        self.inputs.push(Input::OwnModuleKey);
        self
    }

    /// Produce a `T`
    pub fn output<T: 'static + ?Sized>(self) -> Self {
        let tag = TypeTag::of::<T>();
        let implementation = tag.name().to_string();
        self.output_tagged(tag, implementation)
    }

    /// Produce an `I` implemented by `Impl`; bindings select it by `Impl`'s type name
    pub fn output_as<I: 'static + ?Sized, Impl: 'static + ?Sized>(self) -> Self {
        self.output_tagged(TypeTag::of::<I>(), std::any::type_name::<Impl>())
    }

    /// Produce a value under an explicit tag and implementation name
    pub fn output_tagged(mut self, tag: TypeTag, implementation: impl Into<String>) -> Self {
        self.outputs.push(OutputSpec {
            tag,
            implementation: implementation.into(),
            kind: OutputKind::Single,
        });
        self
    }

    /// Produce a `T` visible only inside the owning module
    pub fn module_local<T: 'static + ?Sized>(mut self) -> Self {
        let tag = TypeTag::of::<T>();
        self.outputs.push(OutputSpec {
            implementation: tag.name().to_string(),
            tag,
            kind: OutputKind::ModuleLocal,
        });
        self
    }

    /// Contribute this module's `T` to the module-name keyed collection
    pub fn collect<T: 'static + ?Sized>(mut self) -> Self {
        let tag = TypeTag::of::<T>();
        self.outputs.push(OutputSpec {
            implementation: tag.name().to_string(),
            tag,
            kind: OutputKind::OnePerModule,
        });
        self
    }

    /// Contribute a `T` to the container-wide list
    pub fn many_output<T: 'static + ?Sized>(mut self) -> Self {
        let tag = TypeTag::of::<T>();
        self.outputs.push(OutputSpec {
            implementation: tag.name().to_string(),
            tag,
            kind: OutputKind::ManyPerContainer,
        });
        self
    }

    /// Finish the declaration with the construction function
    pub fn build<F>(self, func: F) -> Provider
    where
        F: Fn(&mut ProviderContext<'_>) -> ProviderResult + Send + Sync + 'static,
    {
        Provider {
            name: self.name,
            inputs: self.inputs,
            outputs: self.outputs,
            func: Arc::new(func),
        }
    }
}
