use crate::container::descriptor::TypeTag;
use crate::errors::CoreError;
use crate::providers::context::{AnyValue, InputValue};
use std::collections::BTreeMap;

/// Module name to value, iterated in sorted module-name order
pub type ModuleMap<T> = BTreeMap<String, T>;

/// What a caller-owned output asks the container for
#[derive(Debug, Clone, PartialEq)]
pub enum Requirement {
    /// One value of the tag, resolved at global scope
    Single(TypeTag),
    /// Every module's contribution of the tag
    OnePerModule(TypeTag),
    /// Every container-wide contribution of the tag
    Many(TypeTag),
}

impl Requirement {
    pub fn tag(&self) -> &TypeTag {
        match self {
            Requirement::Single(tag) | Requirement::OnePerModule(tag) | Requirement::Many(tag) => tag,
        }
    }
}

/// Resolved value handed to an output slot
pub struct ResolvedOutput {
    value: InputValue,
}

impl ResolvedOutput {
    pub(crate) fn new(value: InputValue) -> Self {
        Self { value }
    }

    fn single<T: Clone + 'static>(&self) -> Result<Option<T>, CoreError> {
        match &self.value {
            InputValue::Value(Some(value)) => downcast::<T>(value).map(Some),
            InputValue::Value(None) => Ok(None),
            _ => Err(mismatch::<T>("single value")),
        }
    }

    fn module_map<T: Clone + 'static>(&self) -> Result<ModuleMap<T>, CoreError> {
        match &self.value {
            InputValue::ModuleMap(entries) => entries
                .iter()
                .map(|(name, value)| Ok((name.clone(), downcast::<T>(value)?)))
                .collect(),
            _ => Err(mismatch::<T>("module map")),
        }
    }

    fn many<T: Clone + 'static>(&self) -> Result<Vec<T>, CoreError> {
        match &self.value {
            InputValue::Many(values) => values.iter().map(downcast::<T>).collect(),
            _ => Err(mismatch::<T>("list")),
        }
    }
}

fn downcast<T: Clone + 'static>(value: &AnyValue) -> Result<T, CoreError> {
    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| CoreError::provider(format!("resolved value is not a {}", std::any::type_name::<T>())))
}

fn mismatch<T>(expected: &str) -> CoreError {
    CoreError::provider(format!(
        "output {} expected a {} from the container",
        std::any::type_name::<T>(),
        expected
    ))
}

/// A caller-owned location the container fills after a successful run
pub trait OutputSlot {
    fn requirement(&self) -> Requirement;

    fn fill(&mut self, value: ResolvedOutput) -> Result<(), CoreError>;
}

/// Receives a single `T`
#[derive(Debug, Clone)]
pub struct Slot<T> {
    tag: TypeTag,
    value: Option<T>,
}

impl<T: Clone + Send + Sync + 'static> Slot<T> {
    pub fn new() -> Self {
        Self::tagged(TypeTag::of::<T>())
    }

    /// Receive the value provided under a symbolic tag
    pub fn tagged(tag: TypeTag) -> Self {
        Self { tag, value: None }
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_filled(&self) -> bool {
        self.value.is_some()
    }

    pub fn into_inner(self) -> Option<T> {
        self.value
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> OutputSlot for Slot<T> {
    fn requirement(&self) -> Requirement {
        Requirement::Single(self.tag.clone())
    }

    fn fill(&mut self, value: ResolvedOutput) -> Result<(), CoreError> {
        match value.single::<T>()? {
            Some(value) => {
                self.value = Some(value);
                Ok(())
            }
            None => Err(CoreError::MissingOutput {
                type_name: self.tag.to_string(),
            }),
        }
    }
}

/// Receives every module's `T`, keyed by module name
#[derive(Debug, Clone)]
pub struct ModuleMapSlot<T> {
    values: Option<ModuleMap<T>>,
}

impl<T: Clone + Send + Sync + 'static> ModuleMapSlot<T> {
    pub fn new() -> Self {
        Self { values: None }
    }

    pub fn get(&self) -> Option<&ModuleMap<T>> {
        self.values.as_ref()
    }

    pub fn into_inner(self) -> Option<ModuleMap<T>> {
        self.values
    }
}

impl<T: Clone + Send + Sync + 'static> Default for ModuleMapSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> OutputSlot for ModuleMapSlot<T> {
    fn requirement(&self) -> Requirement {
        Requirement::OnePerModule(TypeTag::of::<T>())
    }

    fn fill(&mut self, value: ResolvedOutput) -> Result<(), CoreError> {
        self.values = Some(value.module_map::<T>()?);
        Ok(())
    }
}

/// Receives every container-wide `T` in registration order
#[derive(Debug, Clone)]
pub struct ManySlot<T> {
    values: Option<Vec<T>>,
}

impl<T: Clone + Send + Sync + 'static> ManySlot<T> {
    pub fn new() -> Self {
        Self { values: None }
    }

    pub fn get(&self) -> Option<&[T]> {
        self.values.as_deref()
    }

    pub fn into_inner(self) -> Option<Vec<T>> {
        self.values
    }
}

impl<T: Clone + Send + Sync + 'static> Default for ManySlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> OutputSlot for ManySlot<T> {
    fn requirement(&self) -> Requirement {
        Requirement::Many(TypeTag::of::<T>())
    }

    fn fill(&mut self, value: ResolvedOutput) -> Result<(), CoreError> {
        self.values = Some(value.many::<T>()?);
        Ok(())
    }
}
