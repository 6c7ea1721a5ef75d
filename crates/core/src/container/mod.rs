#[allow(clippy::module_inception)]
pub mod container;
pub mod binding;
pub mod builder;
pub mod descriptor;
pub mod graph;
pub mod outputs;
pub mod resolver;

pub use binding::{BindingSet, BoundImplementation};
pub use builder::{inject, ContainerBuilder};
pub use container::{Container, Invocation, RunReport};
pub use descriptor::{ModuleKey, Scope, TypeTag};
pub use graph::{ProviderEntry, ProviderIndex};
pub use outputs::{ManySlot, ModuleMap, ModuleMapSlot, OutputSlot, Requirement, ResolvedOutput, Slot};
pub use resolver::{DependencyGraph, ResolutionPath};
