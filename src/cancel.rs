//! Cooperative cancellation signals.
//!
//! Cancellation is hierarchical: series → tournament → match → bot call.
//! Cancelling a token is visible to every token derived from it via
//! [`CancelToken::child`]. Observation is always cooperative; nothing is
//! ever preempted or killed.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A cheaply clonable cancellation signal.
///
/// Clones share the same flag. Children created with [`child`](Self::child)
/// have their own flag but also observe every ancestor's flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    parent: Option<CancelToken>,
}

impl CancelToken {
    /// Creates a new root token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives a child token. Cancelling `self` cancels the child;
    /// cancelling the child leaves `self` untouched.
    pub fn child(&self) -> Self {
        CancelToken {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Requests cancellation of this token and all of its descendants.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// True if this token or any of its ancestors was cancelled.
    pub fn is_cancelled(&self) -> bool {
        let mut current = Some(self);
        while let Some(token) = current {
            if token.inner.cancelled.load(Ordering::SeqCst) {
                return true;
            }
            current = token.inner.parent.as_ref();
        }
        false
    }
}
