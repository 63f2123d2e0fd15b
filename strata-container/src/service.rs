//! Implementation types and their constructors.
//!
//! Without runtime reflection an implementation type describes itself
//! through [`Injectable`]: the constructors the planner may call, the
//! parameters each one takes, and the contracts the type can be handed out
//! as. [`ServiceType`] is the type-erased form the container stores.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//! use strata_container::service::{Casts, Constructor, Injectable, Parameter};
//!
//! trait Repository: Send + Sync {}
//! trait Customer: Send + Sync {}
//!
//! struct CustomerService {
//!     repository: Arc<dyn Repository>,
//! }
//!
//! impl Customer for CustomerService {}
//!
//! impl Injectable for CustomerService {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new(|args| {
//!             Ok(CustomerService { repository: args.required()? })
//!         })
//!         .param(Parameter::of::<dyn Repository>("repository"))]
//!     }
//!
//!     fn contracts(casts: &mut Casts<Self>) {
//!         casts.add::<dyn Customer>(|s| s);
//!     }
//! }
//! ```

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{Result, StrataError};
use crate::key::ContractKey;

/// A constructed instance with its static type erased.
///
/// Always wraps an `Arc<C>` where `C` is the contract it was built for.
pub type ErasedService = Arc<dyn Any + Send + Sync>;

pub(crate) type ErasedBuild =
    Arc<dyn Fn(&mut Arguments) -> Result<ErasedService> + Send + Sync>;

type CastFn = Arc<dyn Fn(&ErasedService) -> Option<ErasedService> + Send + Sync>;

/// Wraps a contract instance for storage in the container.
pub fn erase<C: ?Sized + Send + Sync + 'static>(instance: Arc<C>) -> ErasedService {
    Arc::new(instance)
}

/// Recovers a contract instance wrapped by [`erase`].
pub fn unerase<C: ?Sized + Send + Sync + 'static>(erased: &ErasedService) -> Option<Arc<C>> {
    erased.downcast_ref::<Arc<C>>().cloned()
}

// ============================================================
// Parameters
// ============================================================

/// Where a constructor parameter is resolved from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParameterSource {
    /// Delegate to the next tier of the chain.
    #[default]
    Chain,
    /// Resolve within the tier that is planning the constructor.
    SelfTier,
    /// Resolve from the dependency tier with this name.
    External(String),
}

/// One constructor parameter and its resolution policy.
#[derive(Debug, Clone)]
pub struct Parameter {
    name: &'static str,
    contract: ContractKey,
    source: ParameterSource,
    ignored: bool,
    optional: bool,
}

impl Parameter {
    /// A parameter of contract `C`, resolved through the tier chain.
    pub fn of<C: ?Sized + Send + Sync + 'static>(name: &'static str) -> Self {
        Self {
            name,
            contract: ContractKey::of::<C>(),
            source: ParameterSource::Chain,
            ignored: false,
            optional: false,
        }
    }

    /// Selects the registration named `service` instead of the default one.
    pub fn service(mut self, service: &str) -> Self {
        self.contract = self.contract.with_name(Some(service));
        self
    }

    /// Resolves the parameter within the current tier only.
    pub fn from_self(mut self) -> Self {
        self.source = ParameterSource::SelfTier;
        self
    }

    /// Resolves the parameter from the dependency tier named `tier`.
    pub fn external(mut self, tier: impl Into<String>) -> Self {
        self.source = ParameterSource::External(tier.into());
        self
    }

    /// Binds `None` when no tier can provide the contract.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Never resolves the parameter; the constructor receives `None`.
    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn contract(&self) -> &ContractKey {
        &self.contract
    }

    pub fn source(&self) -> &ParameterSource {
        &self.source
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

// ============================================================
// Arguments
// ============================================================

/// Resolved parameter values handed to a constructor, in declaration order.
pub struct Arguments {
    owner: ContractKey,
    params: Arc<[Parameter]>,
    values: std::vec::IntoIter<Option<ErasedService>>,
    position: usize,
}

impl Arguments {
    pub(crate) fn new(
        owner: ContractKey,
        params: Arc<[Parameter]>,
        values: Vec<Option<ErasedService>>,
    ) -> Self {
        Self {
            owner,
            params,
            values: values.into_iter(),
            position: 0,
        }
    }

    /// Takes the next argument. `None` for ignored parameters and for
    /// optional parameters nobody could provide.
    pub fn next<C: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Option<Arc<C>>> {
        let position = self.position;
        let param = self.params.get(position).ok_or_else(|| {
            StrataError::construction(
                &self.owner,
                format!("constructor read argument #{position} but declares {} parameters", self.params.len()),
            )
        })?;

        if param.contract.type_id() != TypeId::of::<C>() {
            return Err(StrataError::construction(
                &self.owner,
                format!(
                    "parameter '{}' is declared as {} but was read as {}",
                    param.name,
                    param.contract.type_name(),
                    type_name::<C>()
                ),
            ));
        }

        self.position += 1;
        match self.values.next().flatten() {
            None => Ok(None),
            Some(erased) => unerase::<C>(&erased).map(Some).ok_or_else(|| {
                StrataError::construction(
                    &self.owner,
                    format!("parameter '{}' received a value of the wrong type", param.name),
                )
            }),
        }
    }

    /// Takes the next argument, failing if it was not provided.
    pub fn required<C: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<C>> {
        let name = self.params.get(self.position).map(|p| p.name).unwrap_or("?");
        self.next::<C>()?.ok_or_else(|| {
            StrataError::construction(&self.owner, format!("parameter '{name}' has no value"))
        })
    }

    /// Number of arguments not consumed yet.
    pub fn remaining(&self) -> usize {
        self.params.len().saturating_sub(self.position)
    }
}

// ============================================================
// Constructors
// ============================================================

/// One way of building an implementation type.
pub struct Constructor<S> {
    params: Vec<Parameter>,
    reuse: Vec<ContractKey>,
    inject: bool,
    build: Arc<dyn Fn(&mut Arguments) -> Result<S> + Send + Sync>,
}

impl<S: Send + Sync + 'static> Constructor<S> {
    pub fn new(build: impl Fn(&mut Arguments) -> Result<S> + Send + Sync + 'static) -> Self {
        Self {
            params: Vec::new(),
            reuse: Vec::new(),
            inject: false,
            build: Arc::new(build),
        }
    }

    /// Appends a parameter.
    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    /// Shares the first resolution of `C` with every later parameter of
    /// `C` in the same object graph.
    pub fn reuse<C: ?Sized + 'static>(mut self) -> Self {
        self.reuse.push(ContractKey::of::<C>());
        self
    }

    /// Marks this constructor as the one the planner must use.
    pub fn inject(mut self) -> Self {
        self.inject = true;
        self
    }
}

impl<S: Default + Send + Sync + 'static> Constructor<S> {
    /// A parameterless constructor calling `S::default()`.
    pub fn default_new() -> Self {
        Self::new(|_| Ok(S::default()))
    }
}

/// Type-erased constructor stored inside a [`ServiceType`].
#[derive(Clone)]
pub(crate) struct ErasedConstructor {
    pub params: Arc<[Parameter]>,
    pub reuse: Vec<ContractKey>,
    pub inject: bool,
    pub build: ErasedBuild,
}

impl ErasedConstructor {
    fn from_typed<S: Send + Sync + 'static>(ctor: Constructor<S>) -> Self {
        let build = ctor.build;
        Self {
            params: ctor.params.into(),
            reuse: ctor.reuse,
            inject: ctor.inject,
            build: Arc::new(move |args: &mut Arguments| {
                let instance = build(args)?;
                Ok(erase(Arc::new(instance)))
            }),
        }
    }

    pub fn reuses(&self, contract: &ContractKey) -> bool {
        self.reuse.iter().any(|c| c.same_contract(contract))
    }
}

// ============================================================
// Contract casts
// ============================================================

/// Collects the contracts an implementation type can be handed out as.
pub struct Casts<S> {
    entries: Vec<(ContractKey, CastFn)>,
    _marker: PhantomData<fn() -> S>,
}

impl<S: Send + Sync + 'static> Casts<S> {
    fn new() -> Self {
        Self { entries: Vec::new(), _marker: PhantomData }
    }

    /// Declares `C` as a contract of `S`; `cast` is the unsizing
    /// conversion, usually just `|s| s`.
    pub fn add<C: ?Sized + Send + Sync + 'static>(&mut self, cast: fn(Arc<S>) -> Arc<C>) -> &mut Self {
        let erased: CastFn = Arc::new(move |instance: &ErasedService| {
            unerase::<S>(instance).map(|s| erase(cast(s)))
        });
        self.entries.push((ContractKey::of::<C>(), erased));
        self
    }
}

// ============================================================
// Injectable + ServiceType
// ============================================================

/// An implementation type the container knows how to build.
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Registrations of this type are reusable unless stated otherwise.
    const REUSABLE: bool = false;

    /// The constructors the planner may choose from.
    fn constructors() -> Vec<Constructor<Self>>;

    /// Declares the contracts this type implements.
    fn contracts(casts: &mut Casts<Self>) {
        let _ = casts;
    }
}

/// Type-erased description of an implementation type.
#[derive(Clone)]
pub struct ServiceType {
    inner: Arc<ServiceTypeInner>,
}

struct ServiceTypeInner {
    type_id: TypeId,
    type_name: &'static str,
    reusable: bool,
    constructors: Vec<ErasedConstructor>,
    contracts: Vec<ContractKey>,
    casts: HashMap<TypeId, CastFn>,
}

impl ServiceType {
    /// Describes an [`Injectable`] type.
    pub fn of<S: Injectable>() -> Self {
        Self::new::<S>(S::constructors(), S::REUSABLE, S::contracts)
    }

    /// Describes `S` from explicit parts.
    pub fn new<S: Send + Sync + 'static>(
        constructors: Vec<Constructor<S>>,
        reusable: bool,
        contracts: impl FnOnce(&mut Casts<S>),
    ) -> Self {
        let mut casts = Casts::<S>::new();
        contracts(&mut casts);

        let declared = casts.entries.iter().map(|(key, _)| key.clone()).collect();
        let casts = casts
            .entries
            .into_iter()
            .map(|(key, cast)| (key.type_id(), cast))
            .collect();

        Self {
            inner: Arc::new(ServiceTypeInner {
                type_id: TypeId::of::<S>(),
                type_name: type_name::<S>(),
                reusable,
                constructors: constructors.into_iter().map(ErasedConstructor::from_typed).collect(),
                contracts: declared,
                casts,
            }),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.inner.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.inner.type_name
    }

    /// Reuse flag declared by the type itself.
    pub fn is_reusable(&self) -> bool {
        self.inner.reusable
    }

    /// Contracts declared through [`Injectable::contracts`], in order.
    pub fn contracts(&self) -> &[ContractKey] {
        &self.inner.contracts
    }

    /// `true` if instances can be handed out as `contract`. A type is
    /// always assignable to itself.
    pub fn is_assignable_to(&self, contract: TypeId) -> bool {
        contract == self.inner.type_id || self.inner.casts.contains_key(&contract)
    }

    pub(crate) fn key(&self) -> ContractKey {
        ContractKey::from_raw(self.inner.type_id, self.inner.type_name)
    }

    pub(crate) fn cast(&self, contract: TypeId, instance: &ErasedService) -> Option<ErasedService> {
        if contract == self.inner.type_id {
            return Some(instance.clone());
        }
        self.inner.casts.get(&contract).and_then(|cast| cast(instance))
    }

    /// The constructor marked with [`Constructor::inject`], else the only
    /// constructor, else the parameterless one.
    pub(crate) fn select_constructor(&self) -> Option<&ErasedConstructor> {
        let constructors = &self.inner.constructors;
        constructors
            .iter()
            .find(|c| c.inject)
            .or_else(|| match constructors.as_slice() {
                [only] => Some(only),
                _ => None,
            })
            .or_else(|| constructors.iter().find(|c| c.params.is_empty()))
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceType")
            .field("type", &self.inner.type_name)
            .field("reusable", &self.inner.reusable)
            .field("constructors", &self.inner.constructors.len())
            .field("contracts", &self.inner.contracts)
            .finish()
    }
}
