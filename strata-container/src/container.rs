//! # The Container
//!
//! A [`Container`] is a chain of tiers. Services are requested from the
//! root; their constructor parameters are supplied by the dependency tiers
//! below it and, as a last resort, by the shared tier.
//!
//! # Architecture
//! ```text
//! ContainerBuilder ──build()──> Container
//!                                  │
//!                    root ──► dependencies… ──► shared
//!                                  │
//!                  get_service() ─► compile ─► Activator
//! ```
//!
//! # Examples
//! ```rust
//! use strata_container::prelude::*;
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, msg: &str) -> String;
//! }
//!
//! #[derive(Default)]
//! struct ConsoleLogger;
//!
//! impl Logger for ConsoleLogger {
//!     fn log(&self, msg: &str) -> String { format!("[console] {msg}") }
//! }
//!
//! impl Injectable for ConsoleLogger {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::default_new()]
//!     }
//!     fn contracts(casts: &mut Casts<Self>) {
//!         casts.add::<dyn Logger>(|s| s);
//!     }
//! }
//!
//! trait Users: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct UserService {
//!     logger: Arc<dyn Logger>,
//! }
//!
//! impl Users for UserService {
//!     fn greet(&self) -> String { self.logger.log("hello") }
//! }
//!
//! impl Injectable for UserService {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new(|args| Ok(UserService { logger: args.required()? }))
//!             .param(Parameter::of::<dyn Logger>("logger"))]
//!     }
//!     fn contracts(casts: &mut Casts<Self>) {
//!         casts.add::<dyn Users>(|s| s);
//!     }
//! }
//!
//! let container = Container::builder().build().expect("Failed to build container");
//! container.root().add::<dyn Users, UserService>().unwrap();
//! container.shared().add_singleton::<dyn Logger, ConsoleLogger>().unwrap();
//!
//! let users = container.get_service::<dyn Users>().expect("Failed to resolve");
//! assert_eq!(users.greet(), "[console] hello");
//! ```

use std::fmt;
use std::sync::Arc;

use strata_support::rendering::{TierLine, closest_matches, render_tiers};
use tracing::{debug, info, instrument, trace};

use crate::compiler;
use crate::config::ServiceOptions;
use crate::decorator::{Decorator, DecoratorManager, ServiceCallContext};
use crate::error::{Result, ServiceNotRegisteredError, StrataError};
use crate::key::ContractKey;
use crate::notifier::{ContractObserver, DefaultContractObserver, ServiceNotifier};
use crate::provider::Provider;
use crate::registration::ServiceRegistration;
use crate::service::{ErasedService, unerase};
use crate::tier::{ServiceTier, TierKind};

// ============================================================
// ContainerBuilder
// ============================================================

/// Builds a [`Container`] from [`ServiceOptions`], decorators and
/// providers.
///
/// # Examples
/// ```rust,ignore
/// let container = Container::builder()
///     .options(ServiceOptions::new().strict_mode(true).assemblies(["shop"]))
///     .decorate::<dyn Customer>(AuditDecorator)
///     .provider(RepositoryProvider)
///     .build()?;
/// ```
#[derive(Default)]
pub struct ContainerBuilder {
    options: ServiceOptions,
    decorators: DecoratorManager,
    providers: Vec<Box<dyn Provider>>,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Replaces the options.
    pub fn options(mut self, options: ServiceOptions) -> Self {
        self.options = options;
        self
    }

    /// Shortcut for [`ServiceOptions::strict_mode`].
    pub fn strict_mode(mut self, strict: bool) -> Self {
        self.options.strict_mode = strict;
        self
    }

    /// Adds a decorator that runs for every root-level resolution.
    pub fn decorate_all(mut self, decorator: impl Decorator + 'static) -> Self {
        self.decorators.add_global(Arc::new(decorator));
        self
    }

    /// Adds a decorator for contract `C`. It is attached to every
    /// registration of `C` made after the build.
    pub fn decorate<C: ?Sized + 'static>(mut self, decorator: impl Decorator + 'static) -> Self {
        self.decorators.add_for(std::any::TypeId::of::<C>(), Arc::new(decorator));
        self
    }

    /// Adds a [`Provider`] installed right after the tiers are built.
    pub fn provider(mut self, provider: impl Provider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Builds the tier chain, scans the configured crates and installs
    /// the providers.
    ///
    /// # Errors
    /// [`StrataError::DuplicateServiceImplementation`] when scanning in
    /// strict mode finds two implementations of a contract, or any error
    /// returned by a provider.
    #[instrument(skip(self), name = "container_build")]
    pub fn build(self) -> Result<Container> {
        let options = self.options;
        let strict = options.strict_mode;
        let model = options.model;
        let decorators = Arc::new(self.decorators);

        let shared = Arc::new(ServiceTier::new(TierKind::Shared, strict, model, None, decorators.clone()));

        let mut dependencies: Vec<Arc<ServiceTier>> = Vec::new();
        let mut next = shared.clone();
        for dependency in options.dependency_chain().into_iter().rev() {
            let tier = Arc::new(ServiceTier::new(
                TierKind::Dependency(dependency.name.clone()),
                strict,
                model,
                Some(next),
                decorators.clone(),
            ));
            tier.scan(&dependency.assemblies, &dependency.namespaces)?;
            dependencies.insert(0, tier.clone());
            next = tier;
        }

        let root = Arc::new(ServiceTier::new(TierKind::Root, strict, model, Some(next), decorators.clone()));
        root.scan(&options.assemblies, &options.namespaces)?;
        shared.scan(&options.shared.assemblies, &options.shared.namespaces)?;

        let notifier = Arc::new(ServiceNotifier::new());
        let observer: Arc<dyn ContractObserver> = Arc::new(DefaultContractObserver::new(notifier.clone()));
        root.attach_observer(observer.clone())?;
        shared.attach_observer(observer)?;

        let container = Container { root, dependencies, shared, notifier, decorators };
        for provider in &self.providers {
            container.install(provider.as_ref())?;
        }

        info!(
            tiers = container.dependencies.len() + 2,
            contracts = container.root.len(),
            "Container built successfully ✓"
        );
        Ok(container)
    }
}

impl fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("options", &self.options)
            .field("decorators", &self.decorators)
            .field("providers", &self.providers.len())
            .finish()
    }
}

// ============================================================
// Container
// ============================================================

/// Thread-safe, tiered IoC container.
///
/// Created by [`ContainerBuilder::build()`]. Tiers stay open for
/// registration after the build; every change invalidates the compiled
/// activators that depended on it.
pub struct Container {
    root: Arc<ServiceTier>,
    dependencies: Vec<Arc<ServiceTier>>,
    shared: Arc<ServiceTier>,
    notifier: Arc<ServiceNotifier>,
    decorators: Arc<DecoratorManager>,
}

impl Container {
    /// Create a new builder.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// The tier services are requested from.
    pub fn root(&self) -> &ServiceTier {
        &self.root
    }

    /// The tier at the bottom of the chain.
    pub fn shared(&self) -> &ServiceTier {
        &self.shared
    }

    /// The dependency tier named `name` (case-insensitive).
    pub fn dependency(&self, name: &str) -> Option<&ServiceTier> {
        self.root.find_dependency(name).map(Arc::as_ref)
    }

    /// Like [`dependency`](Self::dependency), but fails when the tier does
    /// not exist.
    pub fn dependency_tier(&self, name: &str) -> Result<&ServiceTier> {
        self.dependency(name)
            .ok_or_else(|| StrataError::DependencyTierNotFound { name: name.to_string() })
    }

    /// Every tier from the root down to the shared tier.
    pub fn tiers(&self) -> Vec<&ServiceTier> {
        let mut tiers = vec![self.root.as_ref()];
        tiers.extend(self.dependencies.iter().map(Arc::as_ref));
        tiers.push(self.shared.as_ref());
        tiers
    }

    /// Resolves the default registration of `C` from the root tier.
    ///
    /// ```rust,ignore
    /// let customers: Arc<dyn Customer> = container.get_service()?;
    /// ```
    pub fn get_service<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<C>> {
        let key = ContractKey::of::<C>();
        let erased = self.resolve_registered(&key)?;
        downcast::<C>(&key, &erased)
    }

    /// Resolves the registration of `C` named `name`; `None` if there is
    /// no such registration.
    pub fn get_service_named<C: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Option<Arc<C>>> {
        let key = ContractKey::named::<C>(name);
        self.resolve(&key)?.map(|erased| downcast::<C>(&key, &erased)).transpose()
    }

    /// Resolves `key` from the root tier without static typing. The value
    /// wraps an `Arc<C>` where `C` is the contract of `key`.
    ///
    /// A named key with no registration gives `Ok(None)`. A default key
    /// with no registration is [`StrataError::ServiceNotRegistered`].
    pub fn resolve(&self, key: &ContractKey) -> Result<Option<ErasedService>> {
        trace!(contract = %key, "Resolving");
        match self.root.lookup(key) {
            Some(registration) => self.activate(&registration).map(Some),
            None if key.name().is_some() => {
                trace!(contract = %key, "Named service not registered");
                Ok(None)
            }
            None => Err(self.not_registered(key)),
        }
    }

    fn resolve_registered(&self, key: &ContractKey) -> Result<ErasedService> {
        trace!(contract = %key, "Resolving");
        let registration = self.root.lookup(key).ok_or_else(|| self.not_registered(key))?;
        self.activate(&registration)
    }

    /// Distinct contracts registered in the root tier.
    pub fn all_contracts(&self) -> Vec<ContractKey> {
        self.root.all_contracts()
    }

    /// Runs a [`Provider`] against this container.
    pub fn install(&self, provider: &dyn Provider) -> Result<&Self> {
        debug!(provider = provider.name(), "Installing provider");
        provider.register(self)?;
        Ok(self)
    }

    fn activate(&self, registration: &Arc<ServiceRegistration>) -> Result<ErasedService> {
        let activator = compiler::compile(&self.root, &self.notifier, registration)?;

        if self.decorators.is_empty() && registration.decorators().is_empty() {
            return activator.activate();
        }

        let mut context = ServiceCallContext::new(registration.key().clone(), registration.source().describe());
        self.decorators.before(&mut context, registration.decorators());
        context.set_erased(activator.activate()?);
        self.decorators.after(&mut context, registration.decorators());

        let key = registration.key().clone();
        context
            .into_erased()
            .ok_or_else(|| StrataError::construction(&key, "decorators removed the instance"))
    }

    fn not_registered(&self, key: &ContractKey) -> StrataError {
        StrataError::ServiceNotRegistered(ServiceNotRegisteredError {
            requested: key.clone(),
            suggestions: self.find_suggestions(key),
        })
    }

    fn find_suggestions(&self, key: &ContractKey) -> Vec<String> {
        let mut names: Vec<&'static str> = self.root.registered_keys().iter().map(|k| k.type_name()).collect();
        names.sort_unstable();
        names.dedup();
        closest_matches(key.type_name(), &names, 3)
    }
}

fn downcast<C: ?Sized + Send + Sync + 'static>(key: &ContractKey, erased: &ErasedService) -> Result<Arc<C>> {
    unerase::<C>(erased).ok_or_else(|| {
        StrataError::construction(
            key,
            format!("Type mismatch: expected {}", std::any::type_name::<C>()),
        )
    })
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<TierLine> = self
            .tiers()
            .iter()
            .map(|tier| TierLine { label: tier.label().to_string(), contracts: tier.len() })
            .collect();
        f.write_str(&render_tiers(&lines))
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("tiers", &self.tiers())
            .field("subscribers", &self.notifier.subscribers())
            .finish()
    }
}

// ============================================================
// Prelude
// ============================================================

pub mod prelude {
    pub use super::{Container, ContainerBuilder};
    pub use crate::config::{ContainerModel, DependencyOptions, ServiceOptions, SharedOptions};
    pub use crate::decorator::{Decorator, ServiceCallContext};
    pub use crate::error::{Result, StrataError};
    pub use crate::key::ContractKey;
    pub use crate::lifetime::Lifetime;
    pub use crate::provider::Provider;
    pub use crate::service::{Arguments, Casts, Constructor, Injectable, Parameter, ServiceType};
    pub use crate::tier::ServiceTier;
}

// ============================================================
// Tests
// ============================================================
