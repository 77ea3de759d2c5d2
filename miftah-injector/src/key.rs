//! Stable numeric identities for tokens.
//!
//! A [`Key`] wraps a [`Token`] together with a registry-assigned numeric
//! id. The [`KeyRegistry`] guarantees that one token maps to exactly one
//! key for the registry's lifetime: repeated lookups return the same id
//! and share the same canonical token. The table only grows — there is
//! no removal.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::debug;

use crate::error::{InjectorError, Result};
use crate::token::Token;

/// A registry-assigned identity for a token.
///
/// Keys are cheap to clone; clones of the same key share the canonical
/// token and compare equal by id.
///
/// # Examples
/// ```
/// use miftah_injector::key::KeyRegistry;
/// use miftah_injector::token::Token;
///
/// let registry = KeyRegistry::new();
/// let a = registry.get(&Token::named("db")).unwrap();
/// let b = registry.get(&Token::named("db")).unwrap();
/// assert_eq!(a.id(), b.id());
/// ```
#[derive(Clone)]
pub struct Key {
    id: usize,
    token: Arc<Token>,
}

impl Key {
    /// The numeric id, dense from zero in allocation order.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// The canonical token this key stands for.
    #[inline]
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Rendered token name, used in diagnostics.
    pub fn display_name(&self) -> String {
        self.token.to_string()
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({}, id={})", self.token, self.id)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token)
    }
}

/// Canonicalizes tokens into stable [`Key`]s.
///
/// The registry is an owned, constructible value so tests can work with
/// an isolated table; production code normally goes through
/// [`KeyRegistry::global`], a process-wide instance created once at
/// startup and never cleared. Handles are cheap clones sharing one
/// table, so a parent injector and its children always agree on ids.
#[derive(Clone)]
pub struct KeyRegistry {
    inner: Arc<RegistryTable>,
}

struct RegistryTable {
    keys: DashMap<Token, Key>,
    count: AtomicUsize,
}

static GLOBAL_REGISTRY: Lazy<KeyRegistry> = Lazy::new(KeyRegistry::new);

impl KeyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryTable {
                keys: DashMap::new(),
                count: AtomicUsize::new(0),
            }),
        }
    }

    /// A handle to the process-wide registry.
    pub fn global() -> KeyRegistry {
        GLOBAL_REGISTRY.clone()
    }

    /// Returns the key for `token`, allocating one on first sight.
    ///
    /// Forward references are resolved to their target before lookup,
    /// so a forward ref and its target share a key. Allocation is
    /// atomic per token: concurrent first lookups of the same token
    /// still yield one key.
    ///
    /// # Errors
    /// [`InjectorError::InvalidProvider`] when a forward-reference
    /// chain does not terminate.
    pub fn get(&self, token: &Token) -> Result<Key> {
        let canonical = token.canonical().ok_or_else(|| {
            InjectorError::invalid_provider(
                "forward reference chain does not terminate".to_string(),
                None,
            )
        })?;

        let key = self
            .inner
            .keys
            .entry(canonical.clone())
            .or_insert_with(|| {
                let id = self.inner.count.fetch_add(1, Ordering::Relaxed);
                debug!(token = %canonical, id, "allocated key");
                Key {
                    id,
                    token: Arc::new(canonical),
                }
            })
            .value()
            .clone();

        Ok(key)
    }

    /// Number of keys allocated so far.
    pub fn len(&self) -> usize {
        self.inner.keys.len()
    }

    /// Returns true if no key was ever allocated.
    pub fn is_empty(&self) -> bool {
        self.inner.keys.is_empty()
    }
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KeyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRegistry")
            .field("keys", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::InjectionToken;

    struct Database;

    #[test]
    fn same_token_same_key() {
        let registry = KeyRegistry::new();
        let a = registry.get(&Token::of::<Database>()).unwrap();
        let b = registry.get(&Token::of::<Database>()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());
        // The canonical token is shared, not re-created
        assert!(Arc::ptr_eq(&a.token, &b.token));
    }

    #[test]
    fn distinct_tokens_distinct_ids() {
        let registry = KeyRegistry::new();
        let a = registry.get(&Token::of::<Database>()).unwrap();
        let b = registry.get(&Token::named("db")).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn ids_are_dense() {
        let registry = KeyRegistry::new();
        let a = registry.get(&Token::named("a")).unwrap();
        let b = registry.get(&Token::named("b")).unwrap();
        let c = registry.get(&Token::named("c")).unwrap();
        assert_eq!((a.id(), b.id(), c.id()), (0, 1, 2));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn forward_ref_shares_key_with_target() {
        let registry = KeyRegistry::new();
        let direct = registry.get(&Token::of::<Database>()).unwrap();
        let forwarded = registry
            .get(&Token::forward(|| Token::of::<Database>()))
            .unwrap();
        assert_eq!(direct, forwarded);
    }

    #[test]
    fn runaway_forward_ref_rejected() {
        fn looped() -> Token {
            Token::forward(looped)
        }
        let registry = KeyRegistry::new();
        let result = registry.get(&looped());
        assert!(matches!(
            result.unwrap_err(),
            InjectorError::InvalidProvider(_)
        ));
    }

    #[test]
    fn isolated_registries_do_not_share_ids() {
        let marker = InjectionToken::new("ISOLATED");
        let first = KeyRegistry::new();
        let second = KeyRegistry::new();
        first.get(&Token::named("padding")).unwrap();
        let a = first.get(&Token::Marker(marker)).unwrap();
        let b = second.get(&Token::Marker(marker)).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn global_registry_is_stable() {
        let marker = InjectionToken::new("GLOBAL_STABILITY");
        let a = KeyRegistry::global().get(&Token::Marker(marker)).unwrap();
        let b = KeyRegistry::global().get(&Token::Marker(marker)).unwrap();
        assert_eq!(a, b);
    }
}
