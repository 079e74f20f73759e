use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Observer registry for unrecoverable authentication failure.
///
/// The request gateway has no view layer; when a token refresh is rejected it
/// notifies subscribers here so the application can drop to an
/// unauthenticated state (e.g. redirect to login).
///
/// Callbacks run synchronously, in subscription order. A panicking callback
/// is logged and skipped without affecting the others.
#[derive(Clone, Default)]
pub struct AuthEvents {
    inner: Arc<Mutex<Vec<(u64, Callback)>>>,
    next_id: Arc<AtomicU64>,
}

/// Handle returned by [`AuthEvents::subscribe`]. Dropping it does not
/// unsubscribe; call [`Subscription::unsubscribe`] explicitly.
pub struct Subscription {
    id: u64,
    registry: Arc<Mutex<Vec<(u64, Callback)>>>,
}

impl AuthEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for session-expired notifications.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().unwrap().push((id, Arc::new(callback)));
        Subscription {
            id,
            registry: Arc::clone(&self.inner),
        }
    }

    /// Notify all subscribers that the session is permanently invalid.
    pub fn notify_session_expired(&self) {
        // Snapshot under the lock, invoke outside it, so a callback may
        // subscribe or unsubscribe without deadlocking.
        let callbacks: Vec<Callback> = self
            .inner
            .lock()
            .unwrap()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                warn!("Auth event callback panicked, continuing with remaining subscribers");
            }
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

impl Subscription {
    /// Remove this registration. Idempotent.
    pub fn unsubscribe(&self) {
        let mut callbacks = self.registry.lock().unwrap();
        if let Some(pos) = callbacks.iter().position(|(id, _)| *id == self.id) {
            callbacks.remove(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_notify_invokes_in_subscription_order() {
        let events = AuthEvents::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            events.subscribe(move || order.lock().unwrap().push(label));
        }

        events.notify_session_expired();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe_removes_exactly_one_and_is_idempotent() {
        let events = AuthEvents::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&count);
        let sub = events.subscribe(move || {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = Arc::clone(&count);
        events.subscribe(move || {
            c2.fetch_add(1, Ordering::SeqCst);
        });

        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(events.subscriber_count(), 1);

        events.notify_session_expired();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_callback_does_not_block_others() {
        let events = AuthEvents::new();
        let count = Arc::new(AtomicUsize::new(0));

        events.subscribe(|| panic!("misbehaving observer"));
        let c = Arc::clone(&count);
        events.subscribe(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        events.notify_session_expired();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_may_unsubscribe_itself() {
        let events = AuthEvents::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let slot2 = Arc::clone(&slot);
        let sub = events.subscribe(move || {
            if let Some(sub) = slot2.lock().unwrap().take() {
                sub.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);

        events.notify_session_expired();
        assert_eq!(events.subscriber_count(), 0);
    }
}
