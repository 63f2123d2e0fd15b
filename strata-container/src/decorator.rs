//! Hooks around root-level resolution.
//!
//! Global decorators run for every service handed out by the root tier,
//! contract decorators only for their contract. Both run in registration
//! order, global ones first, before and after the activator is called.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, StrataError};
use crate::key::ContractKey;
use crate::service::{ErasedService, erase, unerase};

/// Intercepts root-level resolutions.
pub trait Decorator: Send + Sync {
    /// Runs before the instance is created. The context has no instance yet.
    fn before(&self, context: &mut ServiceCallContext) {
        let _ = context;
    }

    /// Runs after the instance is created; may replace it.
    fn after(&self, context: &mut ServiceCallContext) {
        let _ = context;
    }
}

/// What a [`Decorator`] sees of one resolution.
pub struct ServiceCallContext {
    contract: ContractKey,
    service: &'static str,
    instance: Option<ErasedService>,
}

impl ServiceCallContext {
    pub(crate) fn new(contract: ContractKey, service: &'static str) -> Self {
        Self { contract, service, instance: None }
    }

    /// The contract being resolved.
    pub fn contract(&self) -> &ContractKey {
        &self.contract
    }

    /// Name of the implementation type, or `<factory>` / `<instance>`.
    pub fn service_type(&self) -> &'static str {
        self.service
    }

    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    /// The created instance as contract `C`. `None` before creation or if
    /// `C` is not the resolved contract.
    pub fn instance<C: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        self.instance.as_ref().and_then(unerase::<C>)
    }

    /// Replaces the created instance.
    ///
    /// # Errors
    /// [`StrataError::InvalidServiceType`] if `C` is not the resolved
    /// contract.
    pub fn replace_instance<C: ?Sized + Send + Sync + 'static>(&mut self, instance: Arc<C>) -> Result<()> {
        if TypeId::of::<C>() != self.contract.type_id() {
            return Err(StrataError::InvalidServiceType {
                contract: self.contract.clone(),
                service: std::any::type_name::<C>(),
            });
        }
        self.instance = Some(erase(instance));
        Ok(())
    }

    pub(crate) fn set_erased(&mut self, instance: ErasedService) {
        self.instance = Some(instance);
    }

    pub(crate) fn into_erased(self) -> Option<ErasedService> {
        self.instance
    }
}

impl fmt::Debug for ServiceCallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCallContext")
            .field("contract", &self.contract)
            .field("service", &self.service)
            .field("has_instance", &self.instance.is_some())
            .finish()
    }
}

/// Global and per-contract decorators of a container.
#[derive(Clone, Default)]
pub struct DecoratorManager {
    global: Vec<Arc<dyn Decorator>>,
    contracts: HashMap<TypeId, Vec<Arc<dyn Decorator>>>,
}

impl DecoratorManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_global(&mut self, decorator: Arc<dyn Decorator>) {
        self.global.push(decorator);
    }

    pub fn add_for(&mut self, contract: TypeId, decorator: Arc<dyn Decorator>) {
        self.contracts.entry(contract).or_default().push(decorator);
    }

    /// Decorators to attach to a new registration of `contract`.
    pub fn for_contract(&self, contract: TypeId) -> Vec<Arc<dyn Decorator>> {
        self.contracts.get(&contract).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.contracts.is_empty()
    }

    pub fn before(&self, context: &mut ServiceCallContext, local: &[Arc<dyn Decorator>]) {
        for decorator in self.global.iter().chain(local) {
            decorator.before(context);
        }
    }

    pub fn after(&self, context: &mut ServiceCallContext, local: &[Arc<dyn Decorator>]) {
        for decorator in self.global.iter().chain(local) {
            decorator.after(context);
        }
    }
}

impl fmt::Debug for DecoratorManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratorManager")
            .field("global", &self.global.len())
            .field("contracts", &self.contracts.len())
            .finish()
    }
}
