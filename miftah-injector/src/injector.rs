//! The hierarchical injector.
//!
//! An [`Injector`] holds compiled bindings plus a parallel cache of
//! constructed instances. Lookup walks from the requesting injector up
//! through its parents; child bindings shadow parent bindings of the
//! same key within that subtree only, and a parent never sees into its
//! children.
//!
//! # Architecture
//! ```text
//! resolve(decls)  ──►  Vec<ResolvedProvider>  ──►  Injector
//!                                                    │
//!                                              create_child()
//!                                                    │
//!                                                    ▼
//!                                                 Injector (parent ↑)
//! ```
//!
//! # Examples
//! ```rust
//! use miftah_injector::prelude::*;
//! use std::sync::Arc;
//!
//! struct Database { url: String }
//!
//! let injector = Injector::create(vec![
//!     Provider::value_of("postgres://localhost".to_string()).into(),
//!     Provider::class(|| {
//!         let url = inject_as::<String>()?;
//!         Ok(Database { url: (*url).clone() })
//!     })
//!     .into(),
//! ])
//! .expect("providers compile");
//!
//! let db: Arc<Database> = injector.resolve().expect("resolves");
//! assert_eq!(db.url, "postgres://localhost");
//! ```

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use miftah_support::rendering::suggest_similar;

use crate::context;
use crate::deps::{Dependency, Visibility};
use crate::error::{
    BoxError, CyclicDependencyError, InjectorError, InstantiationError, NoProviderError, Result,
};
use crate::key::{Key, KeyRegistry};
use crate::provider::{Instance, ProviderDecl};
use crate::resolver::{self, FactoryKind, ResolvedFactory, ResolvedProvider};
use crate::token::Token;

/// Visibility and missing-value options for [`Injector::get_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GetOptions {
    /// Search only this injector, never its parents.
    pub self_only: bool,
    /// Start the search at the parent.
    pub skip_self: bool,
    /// A missing binding yields `None` instead of an error.
    pub optional: bool,
}

/// Hierarchical container resolving tokens to instances, with caching.
///
/// Cheap to clone: clones share the same bindings, cache and parent.
#[derive(Clone)]
pub struct Injector {
    inner: Arc<InjectorInner>,
}

struct InjectorInner {
    providers: Vec<ResolvedProvider>,
    /// Index-aligned with `providers`. A populated slot is never
    /// invalidated for the lifetime of the injector.
    cache: Mutex<Vec<Option<Instance>>>,
    parent: Option<Injector>,
    registry: KeyRegistry,
    injector_key: Key,
}

impl Injector {
    /// Compiles `decls` against the process-wide registry and builds a
    /// root injector.
    pub fn create(decls: Vec<ProviderDecl>) -> Result<Self> {
        Self::build(decls, None, KeyRegistry::global())
    }

    /// Like [`Injector::create`] with an explicit registry — useful
    /// for tests that want an isolated key table.
    pub fn create_with_registry(decls: Vec<ProviderDecl>, registry: KeyRegistry) -> Result<Self> {
        Self::build(decls, None, registry)
    }

    /// Builds an injector from already-compiled providers.
    pub fn from_resolved(
        providers: Vec<ResolvedProvider>,
        parent: Option<Injector>,
        registry: KeyRegistry,
    ) -> Result<Self> {
        let injector_key = registry.get(&Token::injector())?;
        let cache = Mutex::new(vec![None; providers.len()]);

        debug!(
            bindings = providers.len(),
            child = parent.is_some(),
            "created injector"
        );

        Ok(Self {
            inner: Arc::new(InjectorInner {
                providers,
                cache,
                parent,
                registry,
                injector_key,
            }),
        })
    }

    /// Compiles `decls` and builds a child whose parent is `self`.
    ///
    /// The child sees everything `self` and its ancestors provide;
    /// `self` never sees into the child.
    pub fn create_child(&self, decls: Vec<ProviderDecl>) -> Result<Self> {
        Self::build(decls, Some(self.clone()), self.inner.registry.clone())
    }

    fn build(
        decls: Vec<ProviderDecl>,
        parent: Option<Injector>,
        registry: KeyRegistry,
    ) -> Result<Self> {
        let providers = resolver::resolve(decls, &registry)?;
        Self::from_resolved(providers, parent, registry)
    }

    /// The parent injector, if this is not a root.
    pub fn parent(&self) -> Option<&Injector> {
        self.inner.parent.as_ref()
    }

    /// The key registry this injector resolves tokens with.
    pub fn registry(&self) -> &KeyRegistry {
        &self.inner.registry
    }

    /// Number of bindings registered on this injector (excluding
    /// ancestors).
    pub fn provider_count(&self) -> usize {
        self.inner.providers.len()
    }

    pub(crate) fn ptr_eq(&self, other: &Injector) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ── Lookup ──

    /// Resolves `token`, walking up through parent injectors.
    ///
    /// # Errors
    /// [`InjectorError::NoProvider`] when no binding exists anywhere in
    /// the chain; [`InjectorError::CyclicDependency`] and
    /// [`InjectorError::Instantiation`] as construction demands.
    pub fn get(&self, token: impl Into<Token>) -> Result<Instance> {
        let key = self.inner.registry.get(&token.into())?;
        self.get_by_key(&key, Visibility::Default)
    }

    /// [`Injector::get`] with explicit visibility and missing-value
    /// behavior. Returns `Ok(None)` only for an optional miss.
    pub fn get_with(&self, token: impl Into<Token>, options: GetOptions) -> Result<Option<Instance>> {
        let key = self.inner.registry.get(&token.into())?;
        let visibility = if options.self_only {
            Visibility::SelfOnly
        } else if options.skip_self {
            Visibility::SkipSelf
        } else {
            Visibility::Default
        };

        match self.get_by_key(&key, visibility) {
            Ok(value) => Ok(Some(value)),
            // Only a miss of the requested key itself is optional; a
            // missing dependency further down still propagates.
            Err(InjectorError::NoProvider(e)) if options.optional && e.key == key => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// [`Injector::get`], substituting `not_found` when no binding
    /// exists for the requested token. A missing dependency deeper in
    /// the chain, and any construction failure, still propagate.
    pub fn get_or(&self, token: impl Into<Token>, not_found: Instance) -> Result<Instance> {
        let key = self.inner.registry.get(&token.into())?;
        match self.get_by_key(&key, Visibility::Default) {
            Err(InjectorError::NoProvider(e)) if e.key == key => Ok(not_found),
            other => other,
        }
    }

    /// Typed lookup by an explicit token.
    pub fn get_as<T: Send + Sync + 'static>(&self, token: impl Into<Token>) -> Result<Arc<T>> {
        let token = token.into();
        let rendered = token.to_string();
        let value = self.get(token)?;
        value
            .downcast::<T>()
            .map_err(|_| InjectorError::type_mismatch(rendered, type_name::<T>()))
    }

    /// Typed lookup of `T` by its own type token.
    ///
    /// ```rust,ignore
    /// let db: Arc<Database> = injector.resolve()?;
    /// ```
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.get_as(Token::of::<T>())
    }

    /// Resolves a multi binding to its ordered sequence, typed.
    pub fn resolve_all<T: Send + Sync + 'static>(
        &self,
        token: impl Into<Token>,
    ) -> Result<Vec<Arc<T>>> {
        let token = token.into();
        let rendered = token.to_string();
        let value = self.get(token)?;
        let values = value
            .downcast::<Vec<Instance>>()
            .map_err(|_| InjectorError::type_mismatch(rendered.clone(), "a multi binding"))?;

        values
            .iter()
            .cloned()
            .map(|value| {
                value
                    .downcast::<T>()
                    .map_err(|_| InjectorError::type_mismatch(rendered.clone(), type_name::<T>()))
            })
            .collect()
    }

    pub(crate) fn get_by_key(&self, key: &Key, visibility: Visibility) -> Result<Instance> {
        trace!(key = %key, ?visibility, "resolving");

        // Every injector resolves a reference to itself.
        if key.id() == self.inner.injector_key.id() {
            return Ok(Arc::new(self.clone()) as Instance);
        }

        let mut current = match visibility {
            Visibility::SkipSelf => self.inner.parent.clone(),
            _ => Some(self.clone()),
        };

        while let Some(injector) = current {
            if let Some(slot) = injector.local_slot(key) {
                return injector.instantiate_slot(slot);
            }
            if visibility == Visibility::SelfOnly {
                break;
            }
            current = injector.inner.parent.clone();
        }

        Err(self.no_provider(key))
    }

    // ── Construction ──

    /// Constructs a value from an already-compiled provider, bypassing
    /// the cache. Cycle detection still applies.
    pub fn instantiate(&self, provider: &ResolvedProvider) -> Result<Instance> {
        self.construct(provider)
    }

    /// The compiled provider at `index`, in first-occurrence order.
    pub fn provider_at(&self, index: usize) -> Result<&ResolvedProvider> {
        self.inner
            .providers
            .get(index)
            .ok_or(InjectorError::OutOfBounds { index })
    }

    /// Resolves the binding at `index` through the cache, as a
    /// [`Injector::get`] for its key would.
    pub fn instance_at(&self, index: usize) -> Result<Instance> {
        if index >= self.inner.providers.len() {
            return Err(InjectorError::OutOfBounds { index });
        }
        self.instantiate_slot(index)
    }

    fn local_slot(&self, key: &Key) -> Option<usize> {
        // Linear scan: binding counts are tens, not thousands.
        self.inner
            .providers
            .iter()
            .position(|provider| provider.key.id() == key.id())
    }

    fn instantiate_slot(&self, slot: usize) -> Result<Instance> {
        let provider = self
            .inner
            .providers
            .get(slot)
            .ok_or(InjectorError::OutOfBounds { index: slot })?;

        if provider.unique {
            if let Some(cached) = self.inner.cache.lock().get(slot).and_then(|s| s.clone()) {
                trace!(key = %provider.key, "cache hit");
                return Ok(cached);
            }
        }

        let value = self.construct(provider)?;

        if provider.unique {
            let mut cache = self.inner.cache.lock();
            match cache.get_mut(slot) {
                Some(entry) => {
                    if let Some(existing) = entry {
                        // another chain populated the slot first; keep it
                        return Ok(existing.clone());
                    }
                    *entry = Some(value.clone());
                }
                None => return Err(InjectorError::OutOfBounds { index: slot }),
            }
        }

        Ok(value)
    }

    fn construct(&self, provider: &ResolvedProvider) -> Result<Instance> {
        let key = &provider.key;

        // A key already on the ambient path is being constructed right
        // now somewhere below us — that is the cycle.
        if context::path_contains(key.id()) {
            let mut path = context::path();
            path.push(key.clone());
            warn!(key = %key, "cyclic dependency detected");
            return Err(InjectorError::CyclicDependency(CyclicDependencyError {
                path,
            }));
        }

        if provider.multi {
            let mut values = Vec::with_capacity(provider.factories.len());
            for factory in &provider.factories {
                values.push(self.invoke(key, factory)?);
            }
            Ok(Arc::new(values) as Instance)
        } else {
            let factory = provider
                .factories
                .first()
                .ok_or(InjectorError::OutOfBounds { index: 0 })?;
            self.invoke(key, factory)
        }
    }

    fn invoke(&self, key: &Key, factory: &ResolvedFactory) -> Result<Instance> {
        let _guard = context::enter(self, key.clone());

        let produced = match &factory.kind {
            FactoryKind::Ambient(f) => f(),
            FactoryKind::Parameterized { dependencies, ctor } => {
                let mut args = Vec::with_capacity(dependencies.len());
                for dependency in dependencies {
                    match self.resolve_dependency(dependency) {
                        Ok(arg) => args.push(arg),
                        Err(err) => return Err(err),
                    }
                }
                ctor(args)
            }
        };

        produced.map_err(|cause| self.wrap_factory_error(cause, key))
    }

    fn resolve_dependency(&self, dependency: &Dependency) -> Result<Option<Instance>> {
        if dependency.skip {
            return Ok(None);
        }
        match self.get_by_key(&dependency.key, dependency.visibility) {
            Ok(value) => Ok(Some(value)),
            Err(InjectorError::NoProvider(e)) if dependency.optional && e.key == dependency.key => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Diagnostic errors raised by nested lookups pass through
    /// untouched — their path was captured where they occurred.
    /// Anything else the factory reports becomes an instantiation
    /// error carrying the key and the live path.
    fn wrap_factory_error(&self, cause: BoxError, key: &Key) -> InjectorError {
        match cause.downcast::<InjectorError>() {
            Ok(nested) => *nested,
            Err(cause) => InjectorError::Instantiation(InstantiationError {
                key: Some(key.clone()),
                path: context::path(),
                cause,
            }),
        }
    }

    fn no_provider(&self, key: &Key) -> InjectorError {
        let mut path = context::path();
        path.push(key.clone());

        let mut registered: Vec<String> = Vec::new();
        let mut current = Some(self.clone());
        while let Some(injector) = current {
            registered.extend(
                injector
                    .inner
                    .providers
                    .iter()
                    .map(|provider| provider.key.display_name()),
            );
            current = injector.inner.parent.clone();
        }

        InjectorError::NoProvider(NoProviderError {
            key: key.clone(),
            path,
            suggestions: suggest_similar(&key.display_name(), &registered, 3),
        })
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("bindings", &self.provider_count())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{GetOptions, Injector};
    pub use crate::context::{InjectOptions, inject, inject_as, inject_with, run_in_context};
    pub use crate::error::{BoxError, InjectorError, Result};
    pub use crate::key::{Key, KeyRegistry};
    pub use crate::provider::{Instance, Provider, ProviderDecl};
    pub use crate::resolver::{ResolvedProvider, resolve, resolve_with_global};
    pub use crate::token::{InjectionToken, Token};
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
