//! Registrations and their compiled activators.
//!
//! A [`ServiceRegistration`] is what a tier stores per (contract, name):
//! where instances come from, how long they live, and the activator the
//! compiler produced for it the last time it was requested. The activator
//! is dropped whenever a contract it was built from changes.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::trace;

use crate::decorator::Decorator;
use crate::error::{Result, StrataError};
use crate::key::ContractKey;
use crate::lifetime::Lifetime;
use crate::plan::DependencyRegister;
use crate::service::{ErasedService, ServiceType};

/// A user supplied creation function. Its output is already typed as the
/// contract it was registered for.
pub type FactoryFn = Arc<dyn Fn() -> Result<ErasedService> + Send + Sync>;

/// A compiled creation function.
pub(crate) type Creator = Arc<dyn Fn() -> Result<ErasedService> + Send + Sync>;

/// Where instances of a registration come from.
#[derive(Clone)]
pub enum ServiceSource {
    /// Built through one of the type's constructors.
    Type(ServiceType),
    /// Built by calling a factory.
    Factory(FactoryFn),
    /// Always the same prebuilt instance.
    Instance(ErasedService),
}

impl ServiceSource {
    /// Name of the implementation, for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            ServiceSource::Type(ty) => ty.type_name(),
            ServiceSource::Factory(_) => "<factory>",
            ServiceSource::Instance(_) => "<instance>",
        }
    }
}

impl fmt::Debug for ServiceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceSource::Type(ty) => f.debug_tuple("Type").field(&ty.type_name()).finish(),
            ServiceSource::Factory(_) => f.write_str("Factory"),
            ServiceSource::Instance(_) => f.write_str("Instance"),
        }
    }
}

/// One entry of a tier's contract map.
pub struct ServiceRegistration {
    key: ContractKey,
    source: ServiceSource,
    lifetime: Lifetime,
    decorators: Vec<Arc<dyn Decorator>>,
    activator: RwLock<Option<Arc<Activator>>>,
    instance: RwLock<Arc<OnceCell<ErasedService>>>,
    compile_lock: Mutex<()>,
    register: Mutex<Option<DependencyRegister>>,
    subscribed: AtomicBool,
}

impl ServiceRegistration {
    pub(crate) fn new(
        key: ContractKey,
        source: ServiceSource,
        lifetime: Lifetime,
        decorators: Vec<Arc<dyn Decorator>>,
    ) -> Self {
        Self {
            key,
            source,
            lifetime,
            decorators,
            activator: RwLock::new(None),
            instance: RwLock::new(Arc::new(OnceCell::new())),
            compile_lock: Mutex::new(()),
            register: Mutex::new(None),
            subscribed: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &ContractKey {
        &self.key
    }

    pub fn source(&self) -> &ServiceSource {
        &self.source
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// `true` while a compiled activator is cached.
    pub fn is_compiled(&self) -> bool {
        self.activator.read().is_some()
    }

    /// Contracts consulted by the last successful compilation.
    pub fn dependencies(&self) -> Vec<ContractKey> {
        self.register
            .lock()
            .as_ref()
            .map(|register| register.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn decorators(&self) -> &[Arc<dyn Decorator>] {
        &self.decorators
    }

    /// Fails with `InvalidServiceType` if the implementation type cannot
    /// be handed out as the contract.
    pub(crate) fn validate(&self) -> Result<()> {
        if let ServiceSource::Type(ty) = &self.source {
            if !ty.is_assignable_to(self.key.type_id()) {
                return Err(StrataError::InvalidServiceType {
                    contract: self.key.clone(),
                    service: ty.type_name(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn cached_activator(&self) -> Option<Arc<Activator>> {
        self.activator.read().clone()
    }

    pub(crate) fn lock_compile(&self) -> MutexGuard<'_, ()> {
        self.compile_lock.lock()
    }

    /// Returns `true` the first time it is called.
    pub(crate) fn mark_subscribed(&self) -> bool {
        !self.subscribed.swap(true, Ordering::AcqRel)
    }

    /// The cell reusable instances of this registration are memoized in.
    pub(crate) fn instance_cell(&self) -> Arc<OnceCell<ErasedService>> {
        self.instance.read().clone()
    }

    /// Swaps in an empty instance cell. Plans holding the old cell keep
    /// it; plans compiled afterwards use the new one.
    pub(crate) fn reset_instance(&self) {
        *self.instance.write() = Arc::new(OnceCell::new());
    }

    pub(crate) fn store_register(&self, register: DependencyRegister) {
        *self.register.lock() = Some(register);
    }

    /// Caches `activator` unless `still_valid` reports that an
    /// invalidation happened while it was being compiled.
    pub(crate) fn store_activator(
        &self,
        activator: Arc<Activator>,
        still_valid: impl FnOnce() -> bool,
    ) -> bool {
        let mut slot = self.activator.write();
        if !still_valid() {
            return false;
        }
        *slot = Some(activator);
        true
    }

    /// Drops the activator and any memoized instance if the last
    /// compilation consulted a contract of type `contract`.
    pub(crate) fn invalidate_if_depends_on(&self, contract: &ContractKey) -> bool {
        let depends = self
            .register
            .lock()
            .as_ref()
            .is_some_and(|register| register.contains_contract(contract));
        if !depends {
            return false;
        }

        let mut slot = self.activator.write();
        let had_activator = slot.take().is_some();
        self.reset_instance();
        trace!(registration = %self.key, changed = %contract, "Activator dropped");
        had_activator
    }
}

impl fmt::Debug for ServiceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistration")
            .field("key", &self.key)
            .field("source", &self.source)
            .field("lifetime", &self.lifetime)
            .field("decorators", &self.decorators.len())
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

/// Compiled creation function plus the lifetime policy applied to it.
pub struct Activator {
    create: Creator,
    lifetime: Lifetime,
    instance: Arc<OnceCell<ErasedService>>,
}

impl Activator {
    pub(crate) fn new(create: Creator, lifetime: Lifetime, instance: Arc<OnceCell<ErasedService>>) -> Self {
        Self { create, lifetime, instance }
    }

    /// Returns an instance: the memoized one for reusable activators,
    /// a fresh one otherwise.
    pub fn activate(&self) -> Result<ErasedService> {
        match self.lifetime {
            Lifetime::Reusable => self.instance.get_or_try_init(|| (self.create)()).cloned(),
            Lifetime::Transient => (self.create)(),
        }
    }
}

impl fmt::Debug for Activator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activator")
            .field("lifetime", &self.lifetime)
            .field("initialized", &self.instance.get().is_some())
            .finish()
    }
}
