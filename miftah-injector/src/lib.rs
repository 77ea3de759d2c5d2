//! Core resolution engine for Miftah DI.

pub mod context;
pub mod deps;
pub mod error;
pub mod injector;
pub mod key;
pub mod provider;
pub mod resolver;
pub mod token;

pub use context::{InjectOptions, inject, inject_as, inject_with, run_in_context};
pub use deps::{Dependency, ParamAnnotation, ParameterMetadata, TypeMetadataProvider, Visibility};
pub use error::{BoxError, InjectorError, Result};
pub use injector::{GetOptions, Injector, prelude};
pub use key::{Key, KeyRegistry};
pub use provider::{FactoryFn, Instance, ParamFactoryFn, Provider, ProviderDecl, normalize};
pub use resolver::{ResolvedFactory, ResolvedProvider, resolve, resolve_with_global};
pub use token::{ForwardRef, InjectionToken, Token};
