//! Injection tokens — the identities dependencies are requested by.
//!
//! A [`Token`] is anything that can be used as a lookup key: a concrete
//! Rust type, an opaque marker object ([`InjectionToken`]), or a plain
//! string. Tokens are compared by identity — two markers with the same
//! description are different tokens — except strings, which compare by
//! value, and forward references, which resolve to their target before
//! they are ever compared.

use std::any::{TypeId, type_name};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;

use miftah_support::rendering::shorten_type_name;

/// Identity used to request a dependency.
///
/// # Examples
/// ```
/// use miftah_injector::token::{InjectionToken, Token};
///
/// // A concrete type as a token
/// let by_type = Token::of::<String>();
///
/// // An opaque marker — identity, not description, is what counts
/// let config = InjectionToken::new("APP_CONFIG");
/// assert_ne!(Token::from(config), Token::from(InjectionToken::new("APP_CONFIG")));
///
/// // A plain string token, compared by value
/// assert_eq!(Token::named("database_url"), Token::named("database_url"));
/// ```
#[derive(Clone)]
pub enum Token {
    /// A concrete type reference.
    Type {
        id: TypeId,
        name: &'static str,
    },
    /// An opaque marker object.
    Marker(InjectionToken),
    /// A primitive string identifier, compared by value.
    Name(Cow<'static, str>),
    /// A lazily-resolved reference to another token.
    ///
    /// Breaks declaration-order cycles: the closure runs when the
    /// declaration set is compiled, not when it is written down.
    Forward(ForwardRef),
}

/// Forward-reference chains longer than this are treated as
/// non-terminating (a forward ref pointing at itself).
const MAX_FORWARD_DEPTH: usize = 32;

static INJECTOR_MARKER: Lazy<InjectionToken> = Lazy::new(|| InjectionToken::new("Injector"));

impl Token {
    /// Creates a token for type `T`. Works for `dyn Trait` too.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Token::Type {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Creates a string token.
    #[inline]
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Token::Name(name.into())
    }

    /// Creates a forward reference to a token produced later.
    pub fn forward(target: impl Fn() -> Token + Send + Sync + 'static) -> Self {
        Token::Forward(ForwardRef::new(target))
    }

    /// The distinguished token every injector resolves to itself.
    pub fn injector() -> Self {
        Token::Marker(*INJECTOR_MARKER)
    }

    /// Resolves forward references down to a plain token.
    ///
    /// Returns `None` when the chain does not terminate within
    /// [`MAX_FORWARD_DEPTH`] hops.
    pub fn canonical(&self) -> Option<Token> {
        let mut token = self.clone();
        for _ in 0..MAX_FORWARD_DEPTH {
            match token {
                Token::Forward(target) => token = target.resolve(),
                other => return Some(other),
            }
        }
        None
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Token::Type { id: a, .. }, Token::Type { id: b, .. }) => a == b,
            (Token::Marker(a), Token::Marker(b)) => a == b,
            (Token::Name(a), Token::Name(b)) => a == b,
            (Token::Forward(a), Token::Forward(b)) => a.same_target(b),
            _ => false,
        }
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Token::Type { id, .. } => id.hash(state),
            Token::Marker(marker) => marker.id().hash(state),
            Token::Name(name) => name.hash(state),
            Token::Forward(target) => target.addr().hash(state),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Type { name, .. } => write!(f, "{}", shorten_type_name(name)),
            Token::Marker(marker) => write!(f, "{marker}"),
            Token::Name(name) => write!(f, "{name}"),
            Token::Forward(_) => write!(f, "forward(..)"),
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Type { name, .. } => write!(f, "Token::Type({name})"),
            Token::Marker(marker) => write!(f, "Token::Marker({marker:?})"),
            Token::Name(name) => write!(f, "Token::Name({name:?})"),
            Token::Forward(_) => write!(f, "Token::Forward(..)"),
        }
    }
}

/// An opaque marker token.
///
/// Each call to [`InjectionToken::new`] allocates a process-unique
/// identity; the description exists for diagnostics only.
#[derive(Clone, Copy)]
pub struct InjectionToken {
    id: u64,
    description: &'static str,
}

static NEXT_MARKER_ID: AtomicU64 = AtomicU64::new(0);

impl InjectionToken {
    /// Allocates a fresh marker with the given description.
    pub fn new(description: &'static str) -> Self {
        Self {
            id: NEXT_MARKER_ID.fetch_add(1, Ordering::Relaxed),
            description,
        }
    }

    /// The process-unique identity of this marker.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The human-readable description.
    #[inline]
    pub fn description(&self) -> &'static str {
        self.description
    }
}

impl PartialEq for InjectionToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for InjectionToken {}

impl Hash for InjectionToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for InjectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InjectionToken({}, id={})", self.description, self.id)
    }
}

impl fmt::Display for InjectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

/// A lazily-resolved token reference.
///
/// Compared by closure identity: two forward refs are the same token
/// only if they wrap the same closure instance.
#[derive(Clone)]
pub struct ForwardRef(Arc<dyn Fn() -> Token + Send + Sync>);

impl ForwardRef {
    /// Wraps a closure producing the target token.
    pub fn new(target: impl Fn() -> Token + Send + Sync + 'static) -> Self {
        Self(Arc::new(target))
    }

    /// Runs the closure once, yielding the next token in the chain.
    pub fn resolve(&self) -> Token {
        (self.0)()
    }

    fn same_target(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl From<InjectionToken> for Token {
    fn from(marker: InjectionToken) -> Self {
        Token::Marker(marker)
    }
}

impl From<&'static str> for Token {
    fn from(name: &'static str) -> Self {
        Token::named(name)
    }
}

impl From<String> for Token {
    fn from(name: String) -> Self {
        Token::named(name)
    }
}

impl From<ForwardRef> for Token {
    fn from(target: ForwardRef) -> Self {
        Token::Forward(target)
    }
}
