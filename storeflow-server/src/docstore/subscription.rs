//! Live query subscriptions

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// Handle to a live query.
///
/// Dropping the handle or calling [`unsubscribe`](Self::unsubscribe) stops
/// delivery. Unsubscribing more than once is a no-op.
#[derive(Debug)]
pub struct Subscription {
    token: CancellationToken,
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self {
            token,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns true only for the call that actually tore the listener down
    pub fn unsubscribe(&self) -> bool {
        let was_active = self.active.swap(false, Ordering::SeqCst);
        if was_active {
            self.token.cancel();
        }
        was_active
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) && !self.token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// All live queries owned by one view.
///
/// A view re-scoping (new date, new month, new customer) calls
/// [`clear`](Self::clear) before subscribing again, so at most one listener
/// per query is ever alive.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    subs: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sub: Subscription) {
        self.subs.push(sub);
    }

    /// Tear down every subscription
    pub fn clear(&mut self) {
        for sub in self.subs.drain(..) {
            sub.unsubscribe();
        }
    }

    pub fn len(&self) -> usize {
        self.subs.iter().filter(|s| s.is_active()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let token = CancellationToken::new();
        let sub = Subscription::new(token.clone());
        assert!(sub.is_active());
        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
        assert!(token.is_cancelled());
        assert!(!sub.is_active());
    }

    #[test]
    fn test_set_clear_cancels_all() {
        let tokens: Vec<_> = (0..3).map(|_| CancellationToken::new()).collect();
        let mut set = SubscriptionSet::new();
        for t in &tokens {
            set.push(Subscription::new(t.clone()));
        }
        assert_eq!(set.len(), 3);
        set.clear();
        assert!(set.is_empty());
        assert!(tokens.iter().all(|t| t.is_cancelled()));
    }

    #[test]
    fn test_drop_cancels() {
        let token = CancellationToken::new();
        drop(Subscription::new(token.clone()));
        assert!(token.is_cancelled());
    }
}
