use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use uuid::Uuid;

/// Symbolic identifier of a value flowing through the provider graph.
///
/// Providers are matched purely on the tag name. The Rust `TypeId` travels
/// with the tag so that a name declared with two different Rust types is
/// reported at graph-build time instead of failing a downcast later.
#[derive(Debug, Clone)]
pub struct TypeTag {
    name: Cow<'static, str>,
    type_id: TypeId,
}

impl TypeTag {
    /// Tag named after the Rust type
    pub fn of<T: 'static + ?Sized>() -> Self {
        Self {
            name: Cow::Borrowed(std::any::type_name::<T>()),
            type_id: TypeId::of::<T>(),
        }
    }

    /// Tag with a symbolic name, e.g. `"example.Greeter"`
    pub fn named<T: 'static + ?Sized>(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            type_id: TypeId::of::<T>(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Check if the tag carries values of type `T`
    pub fn holds<T: 'static + ?Sized>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Opaque token for one configured module instance within one resolution run.
///
/// Two keys are equal only if they carry the same name and come from the same
/// run, so keys never leak between runs.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleKey {
    name: Arc<str>,
    run_id: Uuid,
}

impl ModuleKey {
    pub(crate) fn new(name: &str, run_id: Uuid) -> Self {
        Self {
            name: Arc::from(name),
            run_id,
        }
    }

    /// Module name as declared in the config
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

impl fmt::Debug for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleKey({})", self.name)
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Where a value lives: container-wide or inside one module instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Module(ModuleKey),
}

impl Scope {
    pub fn from_module(module: Option<&ModuleKey>) -> Self {
        match module {
            Some(key) => Scope::Module(key.clone()),
            None => Scope::Global,
        }
    }

    pub fn module(&self) -> Option<&ModuleKey> {
        match self {
            Scope::Global => None,
            Scope::Module(key) => Some(key),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global scope"),
            Scope::Module(key) => write!(f, "module \"{}\"", key.name()),
        }
    }
}
