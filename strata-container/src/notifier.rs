//! Invalidation of compiled activators.
//!
//! Every registration the compiler has produced an activator for is
//! subscribed (weakly) to the container's [`ServiceNotifier`]. Tiers report
//! additions and replacements through their [`ContractObserver`], and the
//! notifier drops every activator whose dependency register mentions the
//! changed contract.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::key::ContractKey;
use crate::registration::ServiceRegistration;

/// Fans contract changes out to subscribed registrations.
#[derive(Debug, Default)]
pub struct ServiceNotifier {
    subscribers: Mutex<Vec<Weak<ServiceRegistration>>>,
    epoch: AtomicU64,
}

impl ServiceNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a registration. Subscribing twice is a no-op.
    pub fn subscribe(&self, registration: &Arc<ServiceRegistration>) {
        if registration.mark_subscribed() {
            self.subscribers.lock().push(Arc::downgrade(registration));
        }
    }

    /// Drops the activator of every live subscriber that depends on
    /// `contract`. Returns how many activators were dropped.
    pub fn publish(&self, contract: &ContractKey) -> usize {
        self.epoch.fetch_add(1, Ordering::AcqRel);

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|weak| weak.strong_count() > 0);

        let invalidated = subscribers
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|registration| registration.invalidate_if_depends_on(contract))
            .count();

        debug!(contract = %contract, invalidated, "Contract changed");
        invalidated
    }

    /// Number of publications so far. A compilation that sees this value
    /// change did race with an invalidation.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Number of live subscriptions.
    pub fn subscribers(&self) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

/// Receives contract changes from a tier.
pub trait ContractObserver: Send + Sync {
    /// Called after `contract` was added or replaced.
    fn update(&self, contract: &ContractKey);
}

/// Forwards every change to a [`ServiceNotifier`].
#[derive(Debug, Clone)]
pub struct DefaultContractObserver {
    notifier: Arc<ServiceNotifier>,
}

impl DefaultContractObserver {
    pub fn new(notifier: Arc<ServiceNotifier>) -> Self {
        Self { notifier }
    }
}

impl ContractObserver for DefaultContractObserver {
    fn update(&self, contract: &ContractKey) {
        self.notifier.publish(contract);
    }
}
