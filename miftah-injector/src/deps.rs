//! Reflective parameter resolution.
//!
//! Some bindings declare their dependencies as ordered constructor
//! parameters instead of pulling them ambiently. The parameter types
//! come from an external [`TypeMetadataProvider`]; this module turns
//! that metadata into [`Dependency`] records the injector can resolve
//! in order.

use crate::error::{InjectorError, NoAnnotationError, Result};
use crate::key::{Key, KeyRegistry};
use crate::token::Token;

/// Where a dependency lookup is allowed to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Start at the requesting injector, walk up through parents.
    #[default]
    Default,
    /// Search only the requesting injector.
    SelfOnly,
    /// Start at the requesting injector's parent.
    SkipSelf,
}

/// One resolved constructor parameter.
#[derive(Debug, Clone)]
pub struct Dependency {
    /// The key to resolve.
    pub key: Key,
    /// Substitute nothing instead of failing when the key is missing.
    pub optional: bool,
    /// Where the lookup may search.
    pub visibility: Visibility,
    /// Do not resolve at all; the constructor receives `None`.
    pub skip: bool,
}

/// Per-parameter override annotations supplied by the metadata source.
#[derive(Clone)]
pub enum ParamAnnotation {
    /// Use this token instead of the parameter's inferred type.
    Inject(Token),
    /// Missing binding becomes `None` instead of an error.
    Optional,
    /// Never resolve this parameter.
    Skip,
    /// Restrict the lookup to the requesting injector.
    SelfOnly,
    /// Restrict the lookup to the requesting injector's ancestors.
    SkipSelf,
}

/// Raw metadata for one constructor parameter.
#[derive(Clone)]
pub struct ParameterMetadata {
    /// The inferred parameter type, when the metadata source knows it.
    pub type_token: Option<Token>,
    /// Explicit override annotations, applied in order.
    pub annotations: Vec<ParamAnnotation>,
}

impl ParameterMetadata {
    /// A parameter whose type is known.
    pub fn of(token: impl Into<Token>) -> Self {
        Self {
            type_token: Some(token.into()),
            annotations: Vec::new(),
        }
    }

    /// A parameter the metadata source could not type.
    pub fn unknown() -> Self {
        Self {
            type_token: None,
            annotations: Vec::new(),
        }
    }

    /// Adds an annotation.
    pub fn with(mut self, annotation: ParamAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// External source of constructor-parameter metadata.
///
/// The injector consumes this at binding-compile time; implementing it
/// (e.g. from derive macros or a hand-written table) is the caller's
/// concern.
pub trait TypeMetadataProvider: Send + Sync {
    /// Ordered parameter metadata for `subject`, or `None` when the
    /// subject is unknown to this source.
    fn parameters(&self, subject: &Token) -> Option<Vec<ParameterMetadata>>;
}

/// Compiles parameter metadata into ordered [`Dependency`] records.
///
/// The effective token is the last `Inject` annotation if any,
/// otherwise the inferred type.
///
/// # Errors
/// [`InjectorError::NoAnnotation`] when a parameter has neither an
/// inferred type nor an `Inject` override.
pub(crate) fn build_dependencies(
    subject: &Token,
    params: &[ParameterMetadata],
    registry: &KeyRegistry,
) -> Result<Vec<Dependency>> {
    let mut dependencies = Vec::with_capacity(params.len());

    for (position, param) in params.iter().enumerate() {
        let mut token = param.type_token.clone();
        let mut optional = false;
        let mut skip = false;
        let mut visibility = Visibility::Default;

        for annotation in &param.annotations {
            match annotation {
                ParamAnnotation::Inject(explicit) => token = Some(explicit.clone()),
                ParamAnnotation::Optional => optional = true,
                ParamAnnotation::Skip => skip = true,
                ParamAnnotation::SelfOnly => visibility = Visibility::SelfOnly,
                ParamAnnotation::SkipSelf => visibility = Visibility::SkipSelf,
            }
        }

        let Some(token) = token else {
            return Err(InjectorError::NoAnnotation(NoAnnotationError {
                subject: subject.to_string(),
                position,
                signature: render_signature(params),
            }));
        };

        dependencies.push(Dependency {
            key: registry.get(&token)?,
            optional,
            visibility,
            skip,
        });
    }

    Ok(dependencies)
}

fn render_signature(params: &[ParameterMetadata]) -> Vec<String> {
    params
        .iter()
        .map(|param| {
            let explicit = param.annotations.iter().rev().find_map(|a| match a {
                ParamAnnotation::Inject(token) => Some(token.to_string()),
                _ => None,
            });
            explicit
                .or_else(|| param.type_token.as_ref().map(ToString::to_string))
                .unwrap_or_else(|| "?".to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Logger;
    struct Database;
    struct EngineService;

    #[test]
    fn plain_parameters_become_dependencies() {
        let registry = KeyRegistry::new();
        let params = vec![
            ParameterMetadata::of(Token::of::<Logger>()),
            ParameterMetadata::of(Token::of::<Database>()),
        ];

        let deps =
            build_dependencies(&Token::of::<EngineService>(), &params, &registry).unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].key, registry.get(&Token::of::<Logger>()).unwrap());
        assert!(!deps[0].optional);
        assert!(!deps[0].skip);
        assert_eq!(deps[0].visibility, Visibility::Default);
    }

    #[test]
    fn inject_override_replaces_inferred_type() {
        let registry = KeyRegistry::new();
        let params = vec![
            ParameterMetadata::of(Token::of::<Database>())
                .with(ParamAnnotation::Inject(Token::named("replica"))),
        ];

        let deps =
            build_dependencies(&Token::of::<EngineService>(), &params, &registry).unwrap();
        assert_eq!(deps[0].key, registry.get(&Token::named("replica")).unwrap());
    }

    #[test]
    fn override_works_without_inferred_type() {
        let registry = KeyRegistry::new();
        let params =
            vec![ParameterMetadata::unknown().with(ParamAnnotation::Inject(Token::named("raw")))];

        let deps =
            build_dependencies(&Token::of::<EngineService>(), &params, &registry).unwrap();
        assert_eq!(deps[0].key, registry.get(&Token::named("raw")).unwrap());
    }

    #[test]
    fn untyped_parameter_without_override_fails() {
        let registry = KeyRegistry::new();
        let params = vec![
            ParameterMetadata::unknown(),
            ParameterMetadata::of(Token::of::<Logger>()),
        ];

        let err = build_dependencies(&Token::of::<EngineService>(), &params, &registry)
            .unwrap_err();
        match err {
            InjectorError::NoAnnotation(e) => {
                assert!(e.subject.contains("EngineService"));
                assert_eq!(e.position, 0);
                assert_eq!(e.signature[0], "?");
                assert!(e.signature[1].contains("Logger"));
            }
            other => panic!("expected NoAnnotation, got: {other:?}"),
        }
    }

    #[test]
    fn flags_accumulate() {
        let registry = KeyRegistry::new();
        let params = vec![
            ParameterMetadata::of(Token::of::<Logger>())
                .with(ParamAnnotation::Optional)
                .with(ParamAnnotation::SkipSelf),
            ParameterMetadata::of(Token::of::<Database>()).with(ParamAnnotation::Skip),
        ];

        let deps =
            build_dependencies(&Token::of::<EngineService>(), &params, &registry).unwrap();
        assert!(deps[0].optional);
        assert_eq!(deps[0].visibility, Visibility::SkipSelf);
        assert!(deps[1].skip);
    }
}
