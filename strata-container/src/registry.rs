//! Contract map: the registrations of one tier.
//!
//! Maps each contract to its default registration and any number of named
//! registrations. Backed by [`DashMap`] so that tiers can be extended while
//! other threads resolve; no guard is ever held past a single call.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::error::{DuplicateServiceError, Result, StrataError};
use crate::key::ContractKey;
use crate::registration::ServiceRegistration;

#[derive(Debug)]
struct ContractEntry {
    contract: ContractKey,
    default: Option<Arc<ServiceRegistration>>,
    named: HashMap<Arc<str>, Arc<ServiceRegistration>>,
}

impl ContractEntry {
    fn new(contract: ContractKey) -> Self {
        Self { contract, default: None, named: HashMap::new() }
    }

    fn get(&self, name: Option<&str>) -> Option<&Arc<ServiceRegistration>> {
        match name {
            None => self.default.as_ref(),
            Some(name) => self.named.get(name),
        }
    }

    fn insert(&mut self, registration: Arc<ServiceRegistration>) -> Option<Arc<ServiceRegistration>> {
        match registration.key().name() {
            Some(name) => self.named.insert(Arc::from(name), registration),
            None => self.default.replace(registration),
        }
    }
}

/// Stores the registrations of a tier.
#[derive(Debug)]
pub struct ContractMap {
    entries: DashMap<TypeId, ContractEntry>,
    strict: bool,
}

impl ContractMap {
    /// Creates an empty map. In strict mode a second registration for the
    /// same (contract, name) is rejected by [`add`](Self::add).
    pub fn new(strict: bool) -> Self {
        Self { entries: DashMap::new(), strict }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Adds a registration.
    ///
    /// # Errors
    /// - [`StrataError::InvalidServiceType`] if the implementation cannot
    ///   be handed out as the contract.
    /// - [`StrataError::DuplicateServiceImplementation`] in strict mode
    ///   when the (contract, name) pair is taken.
    pub fn add(&self, registration: ServiceRegistration) -> Result<Arc<ServiceRegistration>> {
        registration.validate()?;
        let key = registration.key().clone();
        let registration = Arc::new(registration);

        let mut entry = self
            .entries
            .entry(key.type_id())
            .or_insert_with(|| ContractEntry::new(key.contract()));

        if self.strict && entry.get(key.name()).is_some() {
            return Err(StrataError::DuplicateServiceImplementation(DuplicateServiceError {
                contract: key,
                service: registration.source().describe(),
            }));
        }

        if entry.insert(registration.clone()).is_some() {
            debug!(contract = %key, "Registration overwritten (non-strict)");
        } else {
            debug!(contract = %key, lifetime = %registration.lifetime(), "Registered service");
        }
        Ok(registration)
    }

    /// Adds the registration, replacing any existing one for the same
    /// (contract, name).
    pub fn add_or_replace(&self, registration: ServiceRegistration) -> Result<Arc<ServiceRegistration>> {
        registration.validate()?;
        let key = registration.key().clone();
        let registration = Arc::new(registration);

        let replaced = self
            .entries
            .entry(key.type_id())
            .or_insert_with(|| ContractEntry::new(key.contract()))
            .insert(registration.clone());

        debug!(contract = %key, replaced = replaced.is_some(), "Replaced service");
        Ok(registration)
    }

    /// Looks up the registration for `key`, by its service name if it has one.
    pub fn lookup(&self, key: &ContractKey) -> Option<Arc<ServiceRegistration>> {
        let found = self
            .entries
            .get(&key.type_id())
            .and_then(|entry| entry.get(key.name()).cloned());
        trace!(contract = %key, found = found.is_some(), "Contract lookup");
        found
    }

    pub fn contains(&self, key: &ContractKey) -> bool {
        self.lookup(key).is_some()
    }

    /// Every distinct contract with at least one registration.
    pub fn all_contracts(&self) -> Vec<ContractKey> {
        self.entries
            .iter()
            .filter(|entry| entry.default.is_some() || !entry.named.is_empty())
            .map(|entry| entry.contract.clone())
            .collect()
    }

    /// Every registered (contract, name) pair.
    pub fn registered_keys(&self) -> Vec<ContractKey> {
        let mut keys = Vec::new();
        for entry in self.entries.iter() {
            if let Some(default) = &entry.default {
                keys.push(default.key().clone());
            }
            keys.extend(entry.named.values().map(|r| r.key().clone()));
        }
        keys
    }

    /// Every registration, default and named.
    pub fn registrations(&self) -> Vec<Arc<ServiceRegistration>> {
        let mut all = Vec::new();
        for entry in self.entries.iter() {
            all.extend(entry.default.iter().cloned());
            all.extend(entry.named.values().cloned());
        }
        all
    }

    /// Number of distinct contracts.
    pub fn len(&self) -> usize {
        self.all_contracts().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
