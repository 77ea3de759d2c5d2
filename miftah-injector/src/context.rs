//! The ambient injection context.
//!
//! While a factory runs, "which injector is resolving which key" is
//! recorded in a thread-local stack of frames, so construction code
//! can request its own dependencies with [`inject`] instead of
//! threading the injector through every call. Frames are pushed and
//! popped with a drop guard, so the stack is restored on every exit
//! path, panics included.
//!
//! The context only exists for the synchronous extent of the factory
//! call. A factory that hands work to another thread, or stashes a
//! closure to run later, will find no context there — by design, not
//! by accident.
//!
//! The live stack doubles as the resolution path: it is what error
//! diagnostics render and what cycle detection inspects.

use std::cell::RefCell;

use crate::error::{InjectorError, Result};
use crate::injector::{GetOptions, Injector};
use crate::key::Key;
use crate::provider::Instance;
use crate::token::Token;

thread_local! {
    static FRAMES: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

#[derive(Clone)]
pub(crate) struct Frame {
    pub(crate) injector: Injector,
    pub(crate) key: Key,
}

/// Pops its frame when dropped, restoring the outer context.
pub(crate) struct ContextGuard {
    _private: (),
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        FRAMES.with(|frames| {
            frames.borrow_mut().pop();
        });
    }
}

pub(crate) fn enter(injector: &Injector, key: Key) -> ContextGuard {
    FRAMES.with(|frames| {
        frames.borrow_mut().push(Frame {
            injector: injector.clone(),
            key,
        });
    });
    ContextGuard { _private: () }
}

pub(crate) fn current() -> Option<Frame> {
    FRAMES.with(|frames| frames.borrow().last().cloned())
}

/// The keys currently being resolved, outermost first.
pub(crate) fn path() -> Vec<Key> {
    FRAMES.with(|frames| frames.borrow().iter().map(|f| f.key.clone()).collect())
}

pub(crate) fn path_contains(key_id: usize) -> bool {
    FRAMES.with(|frames| frames.borrow().iter().any(|f| f.key.id() == key_id))
}

/// The injector and key currently being resolved, if any.
pub fn current_context() -> Option<(Injector, Key)> {
    current().map(|frame| (frame.injector, frame.key))
}

/// Runs `f` with the context set to `(injector, token)`, restoring the
/// previous context afterwards — including when `f` panics.
///
/// # Errors
/// Fails only when `token` cannot be resolved to a key (a runaway
/// forward reference).
pub fn run_in_context<R>(
    injector: &Injector,
    token: impl Into<Token>,
    f: impl FnOnce() -> R,
) -> Result<R> {
    let key = injector.registry().get(&token.into())?;
    let _guard = enter(injector, key);
    Ok(f())
}

/// Options for [`inject_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InjectOptions {
    /// A missing binding yields `None` instead of an error.
    pub optional: bool,
    /// Search only the active injector.
    pub self_only: bool,
    /// Start the search at the active injector's parent.
    pub skip_self: bool,
    /// No active context yields `None` instead of an error.
    pub allow_missing_context: bool,
}

/// Resolves `token` against the active injector.
///
/// # Errors
/// [`InjectorError::NotInInjectionContext`] outside a factory call;
/// otherwise whatever the active injector's lookup reports.
pub fn inject(token: impl Into<Token>) -> Result<Instance> {
    let token = token.into();
    match current() {
        Some(frame) => frame.injector.get(token),
        None => Err(InjectorError::NotInInjectionContext {
            token: token.to_string(),
        }),
    }
}

/// [`inject`] with explicit visibility and missing-value behavior.
pub fn inject_with(token: impl Into<Token>, options: InjectOptions) -> Result<Option<Instance>> {
    let token = token.into();
    let Some(frame) = current() else {
        if options.allow_missing_context {
            return Ok(None);
        }
        return Err(InjectorError::NotInInjectionContext {
            token: token.to_string(),
        });
    };

    frame.injector.get_with(
        token,
        GetOptions {
            self_only: options.self_only,
            skip_self: options.skip_self,
            optional: options.optional,
        },
    )
}

/// Typed [`inject`]: resolves `T` by its own type token and downcasts.
pub fn inject_as<T: Send + Sync + 'static>() -> Result<std::sync::Arc<T>> {
    let value = inject(Token::of::<T>())?;
    value.downcast::<T>().map_err(|_| {
        InjectorError::type_mismatch(Token::of::<T>().to_string(), std::any::type_name::<T>())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::Injector;
    use crate::key::KeyRegistry;

    fn empty_injector() -> Injector {
        Injector::create_with_registry(vec![], KeyRegistry::new()).unwrap()
    }

    #[test]
    fn context_is_set_during_call_and_cleared_after() {
        let injector = empty_injector();
        assert!(current_context().is_none());

        run_in_context(&injector, "outer", || {
            let (_, key) = current_context().expect("context active");
            assert_eq!(key.display_name(), "outer");
        })
        .unwrap();

        assert!(current_context().is_none());
    }

    #[test]
    fn nested_contexts_restore_outer() {
        let injector = empty_injector();

        run_in_context(&injector, "outer", || {
            run_in_context(&injector, "inner", || {
                let (_, key) = current_context().unwrap();
                assert_eq!(key.display_name(), "inner");
            })
            .unwrap();

            let (_, key) = current_context().unwrap();
            assert_eq!(key.display_name(), "outer");
        })
        .unwrap();
    }

    #[test]
    fn path_lists_frames_outermost_first() {
        let injector = empty_injector();

        run_in_context(&injector, "outer", || {
            run_in_context(&injector, "inner", || {
                let names: Vec<String> =
                    path().iter().map(Key::display_name).collect();
                assert_eq!(names, vec!["outer", "inner"]);
            })
            .unwrap();
        })
        .unwrap();
    }

    #[test]
    fn context_restored_after_panic() {
        let injector = empty_injector();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            run_in_context(&injector, "doomed", || panic!("boom")).unwrap()
        }));

        assert!(result.is_err());
        assert!(current_context().is_none());
    }

    #[test]
    fn inject_outside_context_fails() {
        let err = inject("anything").err().unwrap();
        assert!(matches!(err, InjectorError::NotInInjectionContext { .. }));
    }

    #[test]
    fn inject_with_allow_missing_context_yields_none() {
        let result = inject_with(
            "anything",
            InjectOptions {
                allow_missing_context: true,
                ..Default::default()
            },
        );
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn inject_delegates_to_active_injector() {
        let registry = KeyRegistry::new();
        let injector = Injector::create_with_registry(
            vec![crate::provider::Provider::value("greeting", "hi".to_string()).into()],
            registry,
        )
        .unwrap();

        let value = run_in_context(&injector, "caller", || inject("greeting"))
            .unwrap()
            .unwrap();
        assert_eq!(*value.downcast::<String>().ok().unwrap(), "hi");
    }
}
