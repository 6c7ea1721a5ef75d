pub mod context;
pub mod provider;

pub use context::{AnyValue, ProviderContext};
pub use provider::{Input, OutputKind, OutputSpec, Provider, ProviderBuilder, ProviderFn, ProviderResult};
