//! Tiers of the container chain.
//!
//! ```text
//! root ──► dependency "C1" ──► dependency "C2" ──► shared
//! ```
//!
//! Each [`ServiceTier`] owns a [`ContractMap`]. The root answers requests,
//! dependency tiers supply constructor parameters of the tier above, and
//! the shared tier is the fallback for every dependency tier. All add and
//! replace operations report the changed contract to the tier's
//! [`ContractObserver`] so that stale activators are dropped.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, trace};

use crate::config::ContainerModel;
use crate::decorator::DecoratorManager;
use crate::error::{Result, StrataError};
use crate::key::ContractKey;
use crate::lifetime::Lifetime;
use crate::notifier::ContractObserver;
use crate::registration::{ServiceRegistration, ServiceSource};
use crate::registry::ContractMap;
use crate::scan;
use crate::service::{Injectable, ServiceType, erase};

/// Position of a tier in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierKind {
    Root,
    Dependency(String),
    Shared,
}

/// One level of the container chain.
pub struct ServiceTier {
    kind: TierKind,
    map: ContractMap,
    model: ContainerModel,
    next: Option<Arc<ServiceTier>>,
    observer: OnceCell<Arc<dyn ContractObserver>>,
    decorators: Arc<DecoratorManager>,
}

impl ServiceTier {
    pub(crate) fn new(
        kind: TierKind,
        strict: bool,
        model: ContainerModel,
        next: Option<Arc<ServiceTier>>,
        decorators: Arc<DecoratorManager>,
    ) -> Self {
        Self {
            kind,
            map: ContractMap::new(strict),
            model,
            next,
            observer: OnceCell::new(),
            decorators,
        }
    }

    pub fn kind(&self) -> &TierKind {
        &self.kind
    }

    /// `root`, `shared`, or the dependency tier's name.
    pub fn label(&self) -> &str {
        match &self.kind {
            TierKind::Root => "root",
            TierKind::Dependency(name) => name,
            TierKind::Shared => "shared",
        }
    }

    pub fn model(&self) -> ContainerModel {
        self.model
    }

    /// The tier below this one.
    pub fn next(&self) -> Option<&Arc<ServiceTier>> {
        self.next.as_ref()
    }

    /// The shared tier at the end of the chain.
    pub fn shared(&self) -> Option<&Arc<ServiceTier>> {
        let mut current = self.next.as_ref();
        while let Some(tier) = current {
            if tier.kind == TierKind::Shared {
                return Some(tier);
            }
            current = tier.next.as_ref();
        }
        None
    }

    /// The dependency tier below this one named `name`, compared
    /// case-insensitively.
    pub fn find_dependency(&self, name: &str) -> Option<&Arc<ServiceTier>> {
        let mut current = self.next.as_ref();
        while let Some(tier) = current {
            if let TierKind::Dependency(tier_name) = &tier.kind {
                if tier_name.eq_ignore_ascii_case(name) {
                    return Some(tier);
                }
            }
            current = tier.next.as_ref();
        }
        None
    }

    // ── Observer ──

    /// Attaches the observer to this tier and to the dependency tiers
    /// below it. The shared tier gets its observer separately.
    ///
    /// # Errors
    /// [`StrataError::OverrideObserver`] if a tier already has one.
    pub fn attach_observer(&self, observer: Arc<dyn ContractObserver>) -> Result<()> {
        self.observer
            .set(observer.clone())
            .map_err(|_| StrataError::OverrideObserver { tier: self.label().to_string() })?;
        trace!(tier = self.label(), "Observer attached");

        match &self.next {
            Some(next) if next.kind != TierKind::Shared => next.attach_observer(observer),
            _ => Ok(()),
        }
    }

    pub fn has_observer(&self) -> bool {
        self.observer.get().is_some()
    }

    // ── Add ──

    /// Registers `S` as the default implementation of `C`.
    pub fn add<C: ?Sized + Send + Sync + 'static, S: Injectable>(&self) -> Result<&Self> {
        self.insert(
            ContractKey::of::<C>(),
            ServiceSource::Type(ServiceType::of::<S>()),
            Lifetime::from_reusable(S::REUSABLE),
            false,
        )
    }

    /// Registers `S` as the implementation of `C` named `name`.
    pub fn add_named<C: ?Sized + Send + Sync + 'static, S: Injectable>(&self, name: &str) -> Result<&Self> {
        self.insert(
            ContractKey::named::<C>(name),
            ServiceSource::Type(ServiceType::of::<S>()),
            Lifetime::from_reusable(S::REUSABLE),
            false,
        )
    }

    /// Registers `S` as the reusable default implementation of `C`.
    pub fn add_singleton<C: ?Sized + Send + Sync + 'static, S: Injectable>(&self) -> Result<&Self> {
        self.insert(
            ContractKey::of::<C>(),
            ServiceSource::Type(ServiceType::of::<S>()),
            Lifetime::Reusable,
            false,
        )
    }

    pub fn add_singleton_named<C: ?Sized + Send + Sync + 'static, S: Injectable>(
        &self,
        name: &str,
    ) -> Result<&Self> {
        self.insert(
            ContractKey::named::<C>(name),
            ServiceSource::Type(ServiceType::of::<S>()),
            Lifetime::Reusable,
            false,
        )
    }

    /// Registers an explicitly described type. Its reuse flag decides the
    /// lifetime.
    pub fn add_type<C: ?Sized + Send + Sync + 'static>(
        &self,
        service: ServiceType,
        name: Option<&str>,
    ) -> Result<&Self> {
        let lifetime = Lifetime::from_reusable(service.is_reusable());
        self.insert(
            ContractKey::of::<C>().with_name(name),
            ServiceSource::Type(service),
            lifetime,
            false,
        )
    }

    /// Registers a factory called on every resolution.
    pub fn add_factory<C, F>(&self, name: Option<&str>, factory: F) -> Result<&Self>
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn() -> Result<Arc<C>> + Send + Sync + 'static,
    {
        self.insert(
            ContractKey::of::<C>().with_name(name),
            ServiceSource::Factory(Arc::new(move || factory().map(erase))),
            Lifetime::Transient,
            false,
        )
    }

    /// Registers a prebuilt instance.
    pub fn add_instance<C: ?Sized + Send + Sync + 'static>(
        &self,
        name: Option<&str>,
        instance: Arc<C>,
    ) -> Result<&Self> {
        self.insert(
            ContractKey::of::<C>().with_name(name),
            ServiceSource::Instance(erase(instance)),
            Lifetime::Reusable,
            false,
        )
    }

    // ── Replace ──

    pub fn replace<C: ?Sized + Send + Sync + 'static, S: Injectable>(&self) -> Result<&Self> {
        self.insert(
            ContractKey::of::<C>(),
            ServiceSource::Type(ServiceType::of::<S>()),
            Lifetime::from_reusable(S::REUSABLE),
            true,
        )
    }

    pub fn replace_named<C: ?Sized + Send + Sync + 'static, S: Injectable>(&self, name: &str) -> Result<&Self> {
        self.insert(
            ContractKey::named::<C>(name),
            ServiceSource::Type(ServiceType::of::<S>()),
            Lifetime::from_reusable(S::REUSABLE),
            true,
        )
    }

    pub fn replace_singleton<C: ?Sized + Send + Sync + 'static, S: Injectable>(&self) -> Result<&Self> {
        self.insert(
            ContractKey::of::<C>(),
            ServiceSource::Type(ServiceType::of::<S>()),
            Lifetime::Reusable,
            true,
        )
    }

    pub fn replace_singleton_named<C: ?Sized + Send + Sync + 'static, S: Injectable>(
        &self,
        name: &str,
    ) -> Result<&Self> {
        self.insert(
            ContractKey::named::<C>(name),
            ServiceSource::Type(ServiceType::of::<S>()),
            Lifetime::Reusable,
            true,
        )
    }

    pub fn replace_type<C: ?Sized + Send + Sync + 'static>(
        &self,
        service: ServiceType,
        name: Option<&str>,
    ) -> Result<&Self> {
        let lifetime = Lifetime::from_reusable(service.is_reusable());
        self.insert(
            ContractKey::of::<C>().with_name(name),
            ServiceSource::Type(service),
            lifetime,
            true,
        )
    }

    pub fn replace_factory<C, F>(&self, name: Option<&str>, factory: F) -> Result<&Self>
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn() -> Result<Arc<C>> + Send + Sync + 'static,
    {
        self.insert(
            ContractKey::of::<C>().with_name(name),
            ServiceSource::Factory(Arc::new(move || factory().map(erase))),
            Lifetime::Transient,
            true,
        )
    }

    pub fn replace_instance<C: ?Sized + Send + Sync + 'static>(
        &self,
        name: Option<&str>,
        instance: Arc<C>,
    ) -> Result<&Self> {
        self.insert(
            ContractKey::of::<C>().with_name(name),
            ServiceSource::Instance(erase(instance)),
            Lifetime::Reusable,
            true,
        )
    }

    // ── Queries ──

    pub fn lookup(&self, key: &ContractKey) -> Option<Arc<ServiceRegistration>> {
        self.map.lookup(key)
    }

    pub fn contains(&self, key: &ContractKey) -> bool {
        self.map.contains(key)
    }

    /// Distinct contracts registered in this tier.
    pub fn all_contracts(&self) -> Vec<ContractKey> {
        self.map.all_contracts()
    }

    /// Every (contract, name) pair registered in this tier.
    pub fn registered_keys(&self) -> Vec<ContractKey> {
        self.map.registered_keys()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    // ── Internal ──

    /// Registers every discovered service selected by the filters.
    pub(crate) fn scan(&self, assemblies: &[String], namespaces: &[String]) -> Result<usize> {
        let mut registered = 0;
        for descriptor in scan::discover(assemblies, namespaces) {
            let service = descriptor.service_type();
            let lifetime = Lifetime::from_reusable(
                descriptor.reuse_override().unwrap_or(service.is_reusable()),
            );
            let contracts = if service.contracts().is_empty() {
                vec![service.key()]
            } else {
                service.contracts().to_vec()
            };

            for contract in contracts {
                self.insert(
                    contract.with_name(descriptor.name()),
                    ServiceSource::Type(service.clone()),
                    lifetime,
                    false,
                )?;
                registered += 1;
            }
        }

        debug!(tier = self.label(), registered, "Scanned services");
        Ok(registered)
    }

    fn insert(&self, key: ContractKey, source: ServiceSource, lifetime: Lifetime, replace: bool) -> Result<&Self> {
        if key.name().is_some_and(str::is_empty) {
            return Err(StrataError::InvalidServiceName { contract: key.contract() });
        }

        let decorators = self.decorators.for_contract(key.type_id());
        let registration = ServiceRegistration::new(key.clone(), source, lifetime, decorators);
        if replace {
            self.map.add_or_replace(registration)?;
        } else {
            self.map.add(registration)?;
        }
        trace!(tier = self.label(), contract = %key, replace, "Contract changed");

        if let Some(observer) = self.observer.get() {
            observer.update(&key);
        }
        Ok(self)
    }
}

impl fmt::Debug for ServiceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceTier")
            .field("tier", &self.label())
            .field("contracts", &self.map.len())
            .field("model", &self.model)
            .field("observed", &self.has_observer())
            .finish()
    }
}
