//! Compiles declarative providers into executable bindings.
//!
//! [`resolve`] normalizes the declarations, compiles each into a
//! factory closure keyed by a registry-assigned [`Key`], and merges
//! duplicates: multi bindings accumulate their factories in
//! declaration order, regular bindings replace each other (last write
//! wins, so later bindings such as test overrides shadow earlier
//! ones). A key targeted by both multi and regular bindings is a
//! configuration error rejected here, before any injector exists.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::context;
use crate::deps::{Dependency, build_dependencies};
use crate::error::{BoxError, InjectorError, MixingMultiProvidersError, Result};
use crate::key::{Key, KeyRegistry};
use crate::provider::{FactoryFn, ParamFactoryFn, Provider, ProviderDecl, Strategy, normalize};

/// The executable form of one or more merged bindings for a key.
#[derive(Clone)]
pub struct ResolvedProvider {
    /// The key all merged bindings target.
    pub key: Key,
    /// One factory for regular bindings, one per binding for multi.
    pub(crate) factories: Vec<ResolvedFactory>,
    /// Aggregate all factories into an ordered sequence.
    pub multi: bool,
    /// Cache the instance after first construction.
    pub unique: bool,
}

impl ResolvedProvider {
    /// Number of factories merged into this binding.
    pub fn factory_count(&self) -> usize {
        self.factories.len()
    }
}

impl fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("key", &self.key)
            .field("factories", &self.factories.len())
            .field("multi", &self.multi)
            .field("unique", &self.unique)
            .finish()
    }
}

/// One compiled factory plus the recipe for its dependency list.
#[derive(Clone)]
pub struct ResolvedFactory {
    pub(crate) kind: FactoryKind,
}

/// How a factory obtains its dependencies — the one axis on which the
/// ambient and reflective strategies differ. Instantiation is a single
/// algorithm parameterized by this.
#[derive(Clone)]
pub(crate) enum FactoryKind {
    /// The closure pulls dependencies ambiently while it runs.
    Ambient(FactoryFn),
    /// Dependencies are resolved up front, in order, and passed in.
    Parameterized {
        dependencies: Vec<Dependency>,
        ctor: ParamFactoryFn,
    },
}

/// Compiles and merges provider declarations against a registry.
///
/// The output is ordered by first occurrence and contains at most one
/// [`ResolvedProvider`] per key.
#[instrument(skip_all, name = "resolve_providers")]
pub fn resolve(decls: Vec<ProviderDecl>, registry: &KeyRegistry) -> Result<Vec<ResolvedProvider>> {
    let providers = normalize(decls)?;

    let mut resolved: Vec<ResolvedProvider> = Vec::with_capacity(providers.len());
    let mut descriptions: Vec<String> = Vec::with_capacity(providers.len());
    let mut slot_by_id: HashMap<usize, usize> = HashMap::new();

    for provider in providers {
        let key = registry.get(provider.token())?;
        let multi = provider.multi;
        let unique = provider.unique;
        let description = provider.describe();
        let factory = compile(provider, registry)?;

        match slot_by_id.get(&key.id()) {
            Some(&slot) => {
                let existing = &mut resolved[slot];
                if existing.multi != multi {
                    return Err(InjectorError::MixingMultiProviders(
                        MixingMultiProvidersError {
                            key,
                            first: descriptions[slot].clone(),
                            second: description,
                        },
                    ));
                }
                if multi {
                    existing.factories.push(factory);
                } else {
                    // last write wins
                    existing.factories = vec![factory];
                    existing.unique = unique;
                    descriptions[slot] = description;
                }
            }
            None => {
                slot_by_id.insert(key.id(), resolved.len());
                resolved.push(ResolvedProvider {
                    key,
                    factories: vec![factory],
                    multi,
                    unique,
                });
                descriptions.push(description);
            }
        }
    }

    debug!(bindings = resolved.len(), "compiled providers");
    Ok(resolved)
}

/// [`resolve`] against the process-wide registry.
pub fn resolve_with_global(decls: Vec<ProviderDecl>) -> Result<Vec<ResolvedProvider>> {
    resolve(decls, &KeyRegistry::global())
}

fn compile(provider: Provider, registry: &KeyRegistry) -> Result<ResolvedFactory> {
    let Provider {
        provide, strategy, ..
    } = provider;

    let kind = match strategy {
        Strategy::Value(value) => {
            FactoryKind::Ambient(Arc::new(move || Ok(value.clone())))
        }
        Strategy::Class(factory) | Strategy::Factory(factory) => FactoryKind::Ambient(factory),
        Strategy::Existing(aliased) => FactoryKind::Ambient(Arc::new(move || {
            context::inject(aliased.clone()).map_err(|e| Box::new(e) as BoxError)
        })),
        Strategy::Constructed { parameters, ctor } => FactoryKind::Parameterized {
            dependencies: build_dependencies(&provide, &parameters, registry)?,
            ctor,
        },
    };

    Ok(ResolvedFactory { kind })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use crate::token::Token;

    #[test]
    fn distinct_tokens_keep_their_order() {
        let registry = KeyRegistry::new();
        let resolved = resolve(
            vec![
                Provider::value("a", 1i32).into(),
                Provider::value("b", 2i32).into(),
            ],
            &registry,
        )
        .unwrap();

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].key, registry.get(&Token::named("a")).unwrap());
        assert_eq!(resolved[1].key, registry.get(&Token::named("b")).unwrap());
    }

    #[test]
    fn regular_duplicates_collapse_to_last() {
        let registry = KeyRegistry::new();
        let resolved = resolve(
            vec![
                Provider::value("x", 1i32).into(),
                Provider::value("x", 2i32).into(),
            ],
            &registry,
        )
        .unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].factory_count(), 1);
    }

    #[test]
    fn multi_bindings_accumulate_in_order() {
        let registry = KeyRegistry::new();
        let resolved = resolve(
            vec![
                Provider::value("plugins", 1i32).multi().into(),
                Provider::value("other", 0i32).into(),
                Provider::value("plugins", 2i32).multi().into(),
                Provider::value("plugins", 3i32).multi().into(),
            ],
            &registry,
        )
        .unwrap();

        assert_eq!(resolved.len(), 2);
        assert!(resolved[0].multi);
        assert_eq!(resolved[0].factory_count(), 3);
    }

    #[test]
    fn mixing_multi_and_regular_is_rejected() {
        let registry = KeyRegistry::new();
        let err = resolve(
            vec![
                Provider::value("x", 1i32).multi().into(),
                Provider::value("x", 2i32).into(),
            ],
            &registry,
        )
        .unwrap_err();

        match err {
            InjectorError::MixingMultiProviders(e) => {
                assert!(e.first.contains("multi"));
                assert!(!e.second.contains("multi"));
            }
            other => panic!("expected MixingMultiProviders, got: {other:?}"),
        }
    }

    #[test]
    fn mixing_detected_in_either_order() {
        let registry = KeyRegistry::new();
        let err = resolve(
            vec![
                Provider::value("x", 1i32).into(),
                Provider::value("x", 2i32).multi().into(),
            ],
            &registry,
        )
        .unwrap_err();

        assert!(matches!(err, InjectorError::MixingMultiProviders(_)));
    }

    #[test]
    fn resolve_with_global_uses_shared_registry() {
        let resolved =
            resolve_with_global(vec![Provider::value("global_cfg", 1i32).into()]).unwrap();
        let key = KeyRegistry::global().get(&Token::named("global_cfg")).unwrap();
        assert_eq!(resolved[0].key, key);
    }

    #[test]
    fn nested_declarations_are_flattened_before_merge() {
        let registry = KeyRegistry::new();
        let resolved = resolve(
            vec![ProviderDecl::Many(vec![
                Provider::value("a", 1i32).into(),
                ProviderDecl::Many(vec![Provider::value("a", 2i32).into()]),
            ])],
            &registry,
        )
        .unwrap();

        assert_eq!(resolved.len(), 1);
    }
}
