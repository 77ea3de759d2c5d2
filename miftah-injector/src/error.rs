//! Error types for resolution failures.
//!
//! Every failure carries the resolution path that led to it, so the
//! message shows the full chain of keys instead of a bare type name.
//! All of these are terminal configuration or usage errors — nothing
//! here is transient or retryable.

use std::fmt;

use miftah_support::rendering::render_chain;

use crate::key::Key;

/// Boxed error type factories use to report their own failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenient Result type for injector operations.
pub type Result<T> = std::result::Result<T, InjectorError>;

/// Main error type for all injector operations.
#[derive(Debug, thiserror::Error)]
pub enum InjectorError {
    /// No binding found for a token anywhere in the injector chain.
    #[error("{}", .0)]
    NoProvider(NoProviderError),

    /// A resolution chain revisited a key it is already constructing.
    #[error("{}", .0)]
    CyclicDependency(CyclicDependencyError),

    /// A factory or constructor itself failed.
    #[error("{}", .0)]
    Instantiation(#[source] InstantiationError),

    /// A provider declaration that cannot be turned into a binding.
    #[error("{}", .0)]
    InvalidProvider(InvalidProviderError),

    /// Two bindings for the same key disagree on `multi`.
    #[error("{}", .0)]
    MixingMultiProviders(MixingMultiProvidersError),

    /// A constructor parameter's type cannot be determined and no
    /// override exists (reflective path only).
    #[error("{}", .0)]
    NoAnnotation(NoAnnotationError),

    /// An index into the provider table is invalid.
    #[error("Provider index {index} is out of bounds")]
    OutOfBounds { index: usize },

    /// `inject` was called with no active injection context.
    #[error(
        "inject() of {token} was called outside an injection context\n  \
         Hint: dependencies are only available during the synchronous extent of a factory call"
    )]
    NotInInjectionContext { token: String },
}

impl InjectorError {
    pub(crate) fn invalid_provider(description: String, position: Option<usize>) -> Self {
        InjectorError::InvalidProvider(InvalidProviderError {
            description,
            position,
        })
    }

    pub(crate) fn type_mismatch(token: String, expected: &'static str) -> Self {
        InjectorError::Instantiation(InstantiationError {
            key: None,
            path: vec![],
            cause: format!("type mismatch for {token}: expected {expected}").into(),
        })
    }
}

fn render_path(path: &[Key]) -> String {
    let names: Vec<String> = path.iter().map(Key::display_name).collect();
    render_chain(&names)
}

/// Error when no binding exists for a requested key.
///
/// Includes the resolution path (outermost request first) and
/// "did you mean?" suggestions drawn from the registered bindings.
#[derive(Debug)]
pub struct NoProviderError {
    /// The key that had no binding.
    pub key: Key,
    /// The chain of keys being resolved, ending with the missing one.
    pub path: Vec<Key>,
    /// Similar bindings that ARE registered.
    pub suggestions: Vec<String>,
}

impl fmt::Display for NoProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No provider for {}!", self.key)?;

        if self.path.len() > 1 {
            write!(f, "\n  Resolution path: {}", render_path(&self.path))?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: register a provider for {} or pass a not-found default",
            self.key
        )
    }
}

/// Error when a resolution chain loops back on itself.
///
/// The path shows the shortest cycle: the repeated key appears at both
/// ends, e.g. `UserService → AuthService → UserService`.
#[derive(Debug)]
pub struct CyclicDependencyError {
    /// The chain of keys, outermost first, ending with the repeat.
    pub path: Vec<Key>,
}

impl fmt::Display for CyclicDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cannot instantiate cyclic dependency!\n  ")?;
        write!(f, "{}", render_path(&self.path))?;
        write!(
            f,
            "\n  Hint: break the cycle with an alias to a forward reference, \
             or restructure the bindings"
        )
    }
}

/// Error when a factory or constructor fails.
///
/// Wraps the original cause and records the key being constructed when
/// it happened, plus the chain of keys that led there.
#[derive(Debug)]
pub struct InstantiationError {
    /// The key whose factory failed, when known.
    pub key: Option<Key>,
    /// The chain of keys being resolved when the factory ran.
    pub path: Vec<Key>,
    /// The factory's own error.
    pub cause: BoxError,
}

impl InstantiationError {
    /// The original error raised inside the factory.
    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.cause.as_ref()
    }
}

impl fmt::Display for InstantiationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "Error during instantiation of {key}: {}", self.cause)?,
            None => write!(f, "Error during instantiation: {}", self.cause)?,
        }
        if self.path.len() > 1 {
            write!(f, "\n  Resolution path: {}", render_path(&self.path))?;
        }
        Ok(())
    }
}

impl std::error::Error for InstantiationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Error when a provider declaration is unusable.
#[derive(Debug)]
pub struct InvalidProviderError {
    /// Description of the offending declaration.
    pub description: String,
    /// Flattened position within the declaration list, when known.
    pub position: Option<usize>,
}

impl fmt::Display for InvalidProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid provider: {}", self.description)?;
        if let Some(position) = self.position {
            write!(f, " (at position {position})")?;
        }
        Ok(())
    }
}

/// Error when multi and regular bindings target the same key.
///
/// This is a configuration error rejected when the declarations are
/// compiled, never a runtime ambiguity.
#[derive(Debug)]
pub struct MixingMultiProvidersError {
    /// The contested key.
    pub key: Key,
    /// The binding seen first.
    pub first: String,
    /// The conflicting binding.
    pub second: String,
}

impl fmt::Display for MixingMultiProvidersError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cannot mix multi providers and regular providers for {}:\n  {}\n  {}",
            self.key, self.first, self.second
        )
    }
}

/// Error when a constructor parameter cannot be mapped to a token.
#[derive(Debug)]
pub struct NoAnnotationError {
    /// The type being constructed.
    pub subject: String,
    /// Zero-based index of the unusable parameter.
    pub position: usize,
    /// The full parameter list, `?` marking unknown types.
    pub signature: Vec<String>,
}

impl fmt::Display for NoAnnotationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cannot resolve all parameters for {}({})",
            self.subject,
            self.signature.join(", ")
        )?;
        write!(
            f,
            "\n  Hint: add an explicit token override for parameter {}",
            self.position
        )
    }
}
