use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use super::snapshot::PoseSnapshot;
use crate::error::Result;

/// Callback invoked with every delivered snapshot
pub type SubscriberFn = dyn Fn(&Rc<PoseSnapshot>) -> Result<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u32);

#[derive(Default)]
struct Registry {
    next_id: u32,
    entries: Vec<(SubscriptionId, Rc<SubscriberFn>)>,
}

/// Shared subscriber registry.
///
/// Cloning yields another handle to the same registry, so callbacks can add
/// or remove subscriptions while a dispatch is running.
#[derive(Clone, Default)]
pub struct Subscribers {
    inner: Rc<RefCell<Registry>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Rc<PoseSnapshot>) -> Result<()> + 'static,
    {
        let mut registry = self.inner.borrow_mut();
        let id = SubscriptionId(registry.next_id);
        registry.next_id = registry.next_id.wrapping_add(1);
        registry.entries.push((id, Rc::new(callback)));

        Subscription {
            id,
            registry: Rc::downgrade(&self.inner),
        }
    }

    /// Remove a subscription; false if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.inner.borrow_mut();
        let before = registry.entries.len();
        registry.entries.retain(|(entry_id, _)| *entry_id != id);
        registry.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver a snapshot to every subscriber registered when dispatch began.
    ///
    /// A failing or panicking subscriber is logged and skipped. Returns the
    /// number of subscribers that accepted the snapshot.
    pub fn dispatch(&self, snapshot: &Rc<PoseSnapshot>) -> usize {
        let entries = self.inner.borrow().entries.clone();

        let mut delivered = 0;
        for (id, callback) in entries {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(snapshot))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => log::error!("Error in pose subscriber {}: {}", id.0, e),
                Err(_) => log::error!("Pose subscriber {} panicked", id.0),
            }
        }
        delivered
    }
}

/// Disposer for one subscription.
///
/// Dropping the handle leaves the subscription in place; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<RefCell<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove exactly this subscription
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(inner) => Subscribers { inner }.unsubscribe(self.id),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackingError;
    use crate::session::snapshot::RawPoseResults;
    use std::cell::Cell;

    fn snapshot() -> Rc<PoseSnapshot> {
        Rc::new(PoseSnapshot::from_results(RawPoseResults::empty(), 0.0))
    }

    #[test]
    fn test_dispatch_reaches_all() {
        let subscribers = Subscribers::new();
        let count = Rc::new(Cell::new(0));
        for _ in 0..3 {
            let count = count.clone();
            subscribers.subscribe(move |_| {
                count.set(count.get() + 1);
                Ok(())
            });
        }

        assert_eq!(subscribers.dispatch(&snapshot()), 3);
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn test_unsubscribe_removes_exactly_one() {
        let subscribers = Subscribers::new();
        let a = subscribers.subscribe(|_| Ok(()));
        let _b = subscribers.subscribe(|_| Ok(()));

        assert!(a.unsubscribe());
        assert_eq!(subscribers.len(), 1);
        assert!(!subscribers.unsubscribe(SubscriptionId(0)));
    }

    #[test]
    fn test_failing_subscriber_is_isolated() {
        let subscribers = Subscribers::new();
        let reached = Rc::new(Cell::new(false));

        subscribers.subscribe(|_| Err(TrackingError::Subscriber("boom".to_string())));
        subscribers.subscribe(|_| panic!("subscriber bug"));
        let r = reached.clone();
        subscribers.subscribe(move |_| {
            r.set(true);
            Ok(())
        });

        assert_eq!(subscribers.dispatch(&snapshot()), 1);
        assert!(reached.get());
    }

    #[test]
    fn test_mutation_during_dispatch() {
        let subscribers = Subscribers::new();
        let handle = subscribers.clone();
        let added = Rc::new(Cell::new(0));

        let a = added.clone();
        subscribers.subscribe(move |_| {
            // Drop the second subscriber and register a third mid-dispatch
            handle.unsubscribe(SubscriptionId(1));
            let a = a.clone();
            handle.subscribe(move |_| {
                a.set(a.get() + 1);
                Ok(())
            });
            Ok(())
        });
        subscribers.subscribe(|_| Ok(()));

        // Both original subscribers are called from the copy taken at dispatch start
        assert_eq!(subscribers.dispatch(&snapshot()), 2);
        assert_eq!(added.get(), 0);
        assert_eq!(subscribers.len(), 2);
    }

    #[test]
    fn test_disposer_after_registry_dropped() {
        let subscribers = Subscribers::new();
        let sub = subscribers.subscribe(|_| Ok(()));
        drop(subscribers);
        assert!(!sub.unsubscribe());
    }
}
