use crate::container::descriptor::{ModuleKey, TypeTag};
use crate::container::outputs::ModuleMap;
use crate::errors::CoreError;
use crate::providers::provider::{Input, OutputSpec};
use std::any::Any;
use std::sync::Arc;

/// Type-erased value held by the container
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// Resolved value of one declared input
#[derive(Clone)]
pub(crate) enum InputValue {
    Value(Option<AnyValue>),
    ModuleMap(Vec<(String, AnyValue)>),
    Many(Vec<AnyValue>),
    Key(ModuleKey),
}

/// Access to a provider's resolved inputs and slots for its outputs during one invocation
pub struct ProviderContext<'a> {
    provider: &'a str,
    inputs: &'a [Input],
    values: Vec<InputValue>,
    outputs: &'a [OutputSpec],
    produced: Vec<Option<AnyValue>>,
}

impl<'a> ProviderContext<'a> {
    pub(crate) fn new(
        provider: &'a str,
        inputs: &'a [Input],
        values: Vec<InputValue>,
        outputs: &'a [OutputSpec],
    ) -> Self {
        Self {
            provider,
            inputs,
            values,
            outputs,
            produced: vec![None; outputs.len()],
        }
    }

    /// Name of the provider being invoked
    pub fn provider_name(&self) -> &str {
        self.provider
    }

    /// Get the required input of type `T`
    pub fn get<T: Clone + 'static>(&self) -> Result<T, CoreError> {
        let what = std::any::type_name::<T>();
        let index = self.value_input(|tag| tag.holds::<T>(), what)?;
        self.required_value::<T>(index, what)
    }

    /// Get a required input by its tag name
    pub fn get_tagged<T: Clone + 'static>(&self, tag: &str) -> Result<T, CoreError> {
        let index = self.value_input(|t| t.name() == tag, tag)?;
        self.required_value::<T>(index, tag)
    }

    /// Get an optional input of type `T`
    pub fn optional<T: Clone + 'static>(&self) -> Result<Option<T>, CoreError> {
        let index = self.value_input(|tag| tag.holds::<T>(), std::any::type_name::<T>())?;
        match &self.values[index] {
            InputValue::Value(Some(value)) => self.downcast::<T>(value).map(Some),
            _ => Ok(None),
        }
    }

    /// Get the module-name keyed map of every module's `T`
    pub fn module_map<T: Clone + 'static>(&self) -> Result<ModuleMap<T>, CoreError> {
        let index = self.find_input(
            |input| matches!(input, Input::OnePerModule(tag) if tag.holds::<T>()),
            std::any::type_name::<T>(),
        )?;
        match &self.values[index] {
            InputValue::ModuleMap(entries) => entries
                .iter()
                .map(|(name, value)| Ok((name.clone(), self.downcast::<T>(value)?)))
                .collect(),
            _ => Err(self.undeclared(format!("one-per-module input {}", std::any::type_name::<T>()))),
        }
    }

    /// Get every `T` contributed in the container
    pub fn many<T: Clone + 'static>(&self) -> Result<Vec<T>, CoreError> {
        let index = self.find_input(
            |input| matches!(input, Input::Many(tag) if tag.holds::<T>()),
            std::any::type_name::<T>(),
        )?;
        match &self.values[index] {
            InputValue::Many(values) => values.iter().map(|value| self.downcast::<T>(value)).collect(),
            _ => Err(self.undeclared(format!("many input {}", std::any::type_name::<T>()))),
        }
    }

    /// Key of the module requesting this provider's outputs
    pub fn module_key(&self) -> Result<ModuleKey, CoreError> {
        let index = self.find_input(|input| matches!(input, Input::ModuleKey), "ModuleKey")?;
        self.key_at(index)
    }

    /// Key of the module that registered this provider
    pub fn own_module_key(&self) -> Result<ModuleKey, CoreError> {
        let index = self.find_input(|input| matches!(input, Input::OwnModuleKey), "OwnModuleKey")?;
        self.key_at(index)
    }

    /// Hand out the output of type `T`
    pub fn provide<T: Send + Sync + 'static>(&mut self, value: T) -> Result<(), CoreError> {
        let index = self
            .outputs
            .iter()
            .position(|output| output.tag.holds::<T>())
            .ok_or_else(|| self.undeclared(format!("output {}", std::any::type_name::<T>())))?;
        self.provide_any(index, Arc::new(value))
    }

    /// Hand out an output by its tag name
    pub fn provide_tagged<T: Send + Sync + 'static>(&mut self, tag: &str, value: T) -> Result<(), CoreError> {
        let index = self
            .outputs
            .iter()
            .position(|output| output.tag.name() == tag)
            .ok_or_else(|| self.undeclared(format!("output {}", tag)))?;
        if !self.outputs[index].tag.holds::<T>() {
            return Err(CoreError::invalid_provider(
                self.provider,
                format!("output {} does not hold {}", tag, std::any::type_name::<T>()),
            ));
        }
        self.provide_any(index, Arc::new(value))
    }

    pub(crate) fn provide_any(&mut self, index: usize, value: AnyValue) -> Result<(), CoreError> {
        if self.produced[index].is_some() {
            return Err(CoreError::invalid_provider(
                self.provider,
                format!("output {} was provided twice", self.outputs[index].tag),
            ));
        }
        self.produced[index] = Some(value);
        Ok(())
    }

    /// Consume the context, checking every declared output was provided
    pub(crate) fn into_outputs(self) -> Result<Vec<AnyValue>, CoreError> {
        let provider = self.provider;
        self.produced
            .into_iter()
            .zip(self.outputs)
            .map(|(value, spec)| {
                value.ok_or_else(|| {
                    CoreError::invalid_provider(provider, format!("declared output {} was never provided", spec.tag))
                })
            })
            .collect()
    }

    fn find_input(&self, predicate: impl Fn(&Input) -> bool, what: &str) -> Result<usize, CoreError> {
        self.inputs
            .iter()
            .position(predicate)
            .ok_or_else(|| self.undeclared(format!("input {}", what)))
    }

    fn value_input(&self, matches: impl Fn(&TypeTag) -> bool, what: &str) -> Result<usize, CoreError> {
        self.find_input(
            |input| match input {
                Input::Value { tag, .. } => matches(tag),
                _ => false,
            },
            what,
        )
    }

    fn required_value<T: Clone + 'static>(&self, index: usize, what: &str) -> Result<T, CoreError> {
        match &self.values[index] {
            InputValue::Value(Some(value)) => self.downcast::<T>(value),
            _ => Err(CoreError::invalid_provider(
                self.provider,
                format!("optional input {} was not provided; read it with optional()", what),
            )),
        }
    }

    fn key_at(&self, index: usize) -> Result<ModuleKey, CoreError> {
        match &self.values[index] {
            InputValue::Key(key) => Ok(key.clone()),
            _ => Err(self.undeclared("module key".to_string())),
        }
    }

    fn downcast<T: Clone + 'static>(&self, value: &AnyValue) -> Result<T, CoreError> {
        value.downcast_ref::<T>().cloned().ok_or_else(|| {
            CoreError::invalid_provider(
                self.provider,
                format!("value is not a {}", std::any::type_name::<T>()),
            )
        })
    }

    fn undeclared(&self, what: String) -> CoreError {
        CoreError::invalid_provider(self.provider, format!("{} is not declared by this provider", what))
    }
}
