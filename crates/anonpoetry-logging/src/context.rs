//! Session context injection
//!
//! Thread-local record of the user session currently being served, so every
//! log line in a scope carries the subject address and a session id.

use std::cell::RefCell;

use anonpoetry_core::Address;
use tracing::span::EnteredSpan;
use uuid::Uuid;

/// Session context data stored in thread-local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContextData {
    /// Subject address of the session
    pub subject: Address,
    /// Unique id for this session
    pub session_id: Uuid,
}

thread_local! {
    static SESSION_CONTEXT: RefCell<Option<SessionContextData>> = const { RefCell::new(None) };
}

/// RAII guard for session context
///
/// Sets the session for the current thread and enters a `session` span
/// carrying `subject` and `session_id`. Dropping it restores the previous
/// context. Guards must be dropped in reverse order of creation.
///
/// # Example
///
/// ```ignore
/// use anonpoetry_logging::SessionContextGuard;
///
/// let _guard = SessionContextGuard::new(&client.user());
///
/// // Logged inside the session span
/// tracing::info!("Revealing poem");
/// ```
pub struct SessionContextGuard {
    previous: Option<SessionContextData>,
    _span: EnteredSpan,
}

impl SessionContextGuard {
    /// Start a new session for `subject`
    pub fn new(subject: &Address) -> Self {
        Self::with_session_id(subject, Uuid::new_v4())
    }

    /// Resume a session with a known id
    pub fn with_session_id(subject: &Address, session_id: Uuid) -> Self {
        let data = SessionContextData {
            subject: *subject,
            session_id,
        };
        let previous = SESSION_CONTEXT.with(|ctx| ctx.borrow_mut().replace(data));

        let span = tracing::info_span!(
            "session",
            subject = %subject.short_id(),
            session_id = %session_id,
        )
        .entered();

        Self {
            previous,
            _span: span,
        }
    }

    /// Get the current session context (if any)
    pub fn current() -> Option<SessionContextData> {
        SESSION_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    pub fn current_subject() -> Option<Address> {
        Self::current().map(|ctx| ctx.subject)
    }

    pub fn current_session_id() -> Option<Uuid> {
        Self::current().map(|ctx| ctx.session_id)
    }
}

impl Drop for SessionContextGuard {
    fn drop(&mut self) {
        SESSION_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Run a block inside a session context
///
/// # Example
///
/// ```ignore
/// with_session_context!(&subject, {
///     tracing::info!("Publishing poem");
/// });
/// ```
#[macro_export]
macro_rules! with_session_context {
    ($subject:expr, $body:block) => {{
        let _guard = $crate::context::SessionContextGuard::new($subject);
        $body
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: Address = Address::new([0xa1; 20]);
    const BOB: Address = Address::new([0xb0; 20]);

    #[test]
    fn test_session_context_guard() {
        // No context initially
        assert!(SessionContextGuard::current().is_none());

        {
            let _guard = SessionContextGuard::new(&ALICE);
            let ctx = SessionContextGuard::current().unwrap();
            assert_eq!(ctx.subject, ALICE);
        }

        // Context should be cleared after guard drops
        assert!(SessionContextGuard::current().is_none());
    }

    #[test]
    fn test_nested_contexts() {
        {
            let _guard_a = SessionContextGuard::new(&ALICE);
            assert_eq!(SessionContextGuard::current_subject(), Some(ALICE));

            {
                let _guard_b = SessionContextGuard::new(&BOB);
                assert_eq!(SessionContextGuard::current_subject(), Some(BOB));
            }

            // Should restore to Alice after Bob's guard drops
            assert_eq!(SessionContextGuard::current_subject(), Some(ALICE));
        }

        assert!(SessionContextGuard::current_subject().is_none());
    }

    #[test]
    fn test_with_session_id() {
        let session_id = Uuid::new_v4();
        let _guard = SessionContextGuard::with_session_id(&ALICE, session_id);
        assert_eq!(SessionContextGuard::current_session_id(), Some(session_id));
    }

    #[test]
    fn test_macro_scopes_context() {
        let seen = with_session_context!(&BOB, { SessionContextGuard::current_subject() });
        assert_eq!(seen, Some(BOB));
        assert!(SessionContextGuard::current().is_none());
    }
}
