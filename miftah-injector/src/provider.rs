//! Declarative providers — how a token gets a value.
//!
//! A [`Provider`] pairs a token with one of five construction
//! strategies: a captured value, an ambient class constructor, an alias
//! to another token, a factory closure, or a reflectively-constructed
//! binding whose parameters come from type metadata. Declarations can
//! nest arbitrarily ([`ProviderDecl`]); [`normalize`] flattens them
//! into a uniform list before compilation.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::deps::{ParameterMetadata, TypeMetadataProvider};
use crate::error::{BoxError, InjectorError, Result};
use crate::token::Token;

/// A type-erased, shared instance produced by a binding.
///
/// Cached instances are handed out by cloning the `Arc`, so "same
/// instance" is observable with [`Arc::ptr_eq`].
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Factory closure for bindings whose dependencies are obtained
/// ambiently (via [`crate::context::inject`]) while the closure runs.
pub type FactoryFn = Arc<dyn Fn() -> std::result::Result<Instance, BoxError> + Send + Sync>;

/// Factory closure for reflectively-constructed bindings: receives the
/// resolved parameters in declaration order, `None` standing in for
/// skipped parameters and optional misses.
pub type ParamFactoryFn =
    Arc<dyn Fn(Vec<Option<Instance>>) -> std::result::Result<Instance, BoxError> + Send + Sync>;

/// One declarative binding.
pub struct Provider {
    pub(crate) provide: Token,
    pub(crate) strategy: Strategy,
    pub(crate) multi: bool,
    pub(crate) unique: bool,
}

pub(crate) enum Strategy {
    /// Return the captured value.
    Value(Instance),
    /// Construct the type; dependencies pulled ambiently inside.
    Class(FactoryFn),
    /// Delegate to another token, looked up at call time.
    Existing(Token),
    /// Invoke a user closure; dependencies pulled ambiently inside.
    Factory(FactoryFn),
    /// Resolve ordered parameters from metadata, then construct.
    Constructed {
        parameters: Vec<ParameterMetadata>,
        ctor: ParamFactoryFn,
    },
}

fn ambient_factory<T, F>(construct: F) -> FactoryFn
where
    T: Send + Sync + 'static,
    F: Fn() -> std::result::Result<T, BoxError> + Send + Sync + 'static,
{
    Arc::new(move || construct().map(|value| Arc::new(value) as Instance))
}

impl Provider {
    /// Binds a pre-built value to a token.
    pub fn value<T: Send + Sync + 'static>(token: impl Into<Token>, value: T) -> Self {
        Self {
            provide: token.into(),
            strategy: Strategy::Value(Arc::new(value)),
            multi: false,
            unique: true,
        }
    }

    /// Binds a pre-built value to its own type.
    pub fn value_of<T: Send + Sync + 'static>(value: T) -> Self {
        Self::value(Token::of::<T>(), value)
    }

    /// Binds type `T` to a construct closure; the token defaults to
    /// `T` itself. Dependencies are pulled ambiently inside the
    /// closure.
    pub fn class<T, F>(construct: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            provide: Token::of::<T>(),
            strategy: Strategy::Class(ambient_factory(construct)),
            multi: false,
            unique: true,
        }
    }

    /// Binds a token as an alias: resolving it resolves `aliased`
    /// instead. The alias is followed at call time, so it may be a
    /// forward reference to a token bound later.
    pub fn existing(token: impl Into<Token>, aliased: impl Into<Token>) -> Self {
        Self {
            provide: token.into(),
            strategy: Strategy::Existing(aliased.into()),
            multi: false,
            unique: true,
        }
    }

    /// Binds a token to a factory closure. Dependencies are pulled
    /// ambiently inside the closure.
    pub fn factory<T, F>(token: impl Into<Token>, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            provide: token.into(),
            strategy: Strategy::Factory(ambient_factory(factory)),
            multi: false,
            unique: true,
        }
    }

    /// Binds a token to a constructor whose parameters are declared as
    /// ordered [`ParameterMetadata`]. The constructor receives the
    /// resolved parameters in order.
    pub fn constructed<T, F>(
        token: impl Into<Token>,
        parameters: Vec<ParameterMetadata>,
        ctor: F,
    ) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Vec<Option<Instance>>) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            provide: token.into(),
            strategy: Strategy::Constructed {
                parameters,
                ctor: Arc::new(move |args| ctor(args).map(|value| Arc::new(value) as Instance)),
            },
            multi: false,
            unique: true,
        }
    }

    /// Like [`Provider::constructed`], with the parameter list pulled
    /// from an external metadata source. An unknown subject gets an
    /// empty parameter list.
    pub fn from_metadata<T, F>(
        token: impl Into<Token>,
        metadata: &dyn TypeMetadataProvider,
        ctor: F,
    ) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Vec<Option<Instance>>) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        let provide = token.into();
        let parameters = metadata.parameters(&provide).unwrap_or_default();
        Self::constructed(provide, parameters, ctor)
    }

    /// Aggregates this binding with the other `multi` bindings for the
    /// same token into an ordered sequence.
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    /// Re-invoke the factory on every lookup instead of caching.
    pub fn transient(mut self) -> Self {
        self.unique = false;
        self
    }

    /// Retargets the binding to another token.
    pub fn for_token(mut self, token: impl Into<Token>) -> Self {
        self.provide = token.into();
        self
    }

    /// The token this binding provides.
    pub fn token(&self) -> &Token {
        &self.provide
    }

    pub(crate) fn describe(&self) -> String {
        let kind = match &self.strategy {
            Strategy::Value(_) => "value",
            Strategy::Class(_) => "class",
            Strategy::Existing(_) => "alias",
            Strategy::Factory(_) => "factory",
            Strategy::Constructed { .. } => "constructed",
        };
        if self.multi {
            format!("multi {kind} provider for {}", self.provide)
        } else {
            format!("{kind} provider for {}", self.provide)
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("provide", &self.provide)
            .field("kind", &self.describe())
            .field("multi", &self.multi)
            .field("unique", &self.unique)
            .finish()
    }
}

/// A possibly-nested provider declaration.
///
/// Sequences nest to unbounded depth; [`normalize`] flattens them in
/// declaration order.
pub enum ProviderDecl {
    One(Provider),
    Many(Vec<ProviderDecl>),
}

impl From<Provider> for ProviderDecl {
    fn from(provider: Provider) -> Self {
        ProviderDecl::One(provider)
    }
}

impl From<Vec<ProviderDecl>> for ProviderDecl {
    fn from(decls: Vec<ProviderDecl>) -> Self {
        ProviderDecl::Many(decls)
    }
}

/// Flattens nested declarations into a uniform provider list.
///
/// Each leaf is assigned its flattened position; tokens are resolved
/// to canonical (forward-free) form here, once, so everything
/// downstream works with plain tokens.
///
/// # Errors
/// [`InjectorError::InvalidProvider`] naming the offending declaration
/// and its position when a forward-reference chain does not terminate.
pub fn normalize(decls: Vec<ProviderDecl>) -> Result<Vec<Provider>> {
    fn walk(decls: Vec<ProviderDecl>, out: &mut Vec<Provider>, position: &mut usize) -> Result<()> {
        for decl in decls {
            match decl {
                ProviderDecl::Many(nested) => walk(nested, out, position)?,
                ProviderDecl::One(mut provider) => {
                    let canonical = provider.provide.canonical().ok_or_else(|| {
                        InjectorError::invalid_provider(provider.describe(), Some(*position))
                    })?;
                    provider.provide = canonical;
                    out.push(provider);
                    *position += 1;
                }
            }
        }
        Ok(())
    }

    let mut out = Vec::new();
    let mut position = 0;
    walk(decls, &mut out, &mut position)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Engine;

    #[test]
    fn flattens_nested_sequences() {
        let decls = vec![
            Provider::value("a", 1i32).into(),
            ProviderDecl::Many(vec![
                Provider::value("b", 2i32).into(),
                ProviderDecl::Many(vec![Provider::value("c", 3i32).into()]),
            ]),
            Provider::value("d", 4i32).into(),
        ];

        let providers = normalize(decls).unwrap();
        let tokens: Vec<String> = providers.iter().map(|p| p.provide.to_string()).collect();
        assert_eq!(tokens, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn class_binding_targets_own_type() {
        let provider = Provider::class(|| Ok(Engine));
        assert_eq!(*provider.token(), Token::of::<Engine>());
        assert!(provider.unique);
        assert!(!provider.multi);
    }

    #[test]
    fn modifiers_set_flags() {
        let provider = Provider::value("x", 1i32).multi();
        assert!(provider.multi);

        let provider = Provider::class(|| Ok(Engine)).transient();
        assert!(!provider.unique);

        let provider = Provider::class(|| Ok(Engine)).for_token("engine");
        assert_eq!(*provider.token(), Token::named("engine"));
    }

    #[test]
    fn forward_provide_is_canonicalized() {
        let decls = vec![
            Provider::value(Token::forward(|| Token::named("late")), 1i32).into(),
        ];

        let providers = normalize(decls).unwrap();
        assert_eq!(*providers[0].token(), Token::named("late"));
    }

    #[test]
    fn runaway_forward_names_position() {
        fn looped() -> Token {
            Token::forward(looped)
        }
        let decls = vec![
            Provider::value("fine", 1i32).into(),
            Provider::value(looped(), 2i32).into(),
        ];

        match normalize(decls).unwrap_err() {
            InjectorError::InvalidProvider(e) => {
                assert_eq!(e.position, Some(1));
                assert!(e.description.contains("value provider"));
            }
            other => panic!("expected InvalidProvider, got: {other:?}"),
        }
    }

    #[test]
    fn describe_names_kind_and_token() {
        assert_eq!(
            Provider::value("cfg", 1i32).describe(),
            "value provider for cfg"
        );
        assert_eq!(
            Provider::value("cfg", 1i32).multi().describe(),
            "multi value provider for cfg"
        );
    }
}
