//! Constructor planning across tiers.
//!
//! Planning walks the constructor of the requested implementation and
//! decides, parameter by parameter, which tier supplies the value:
//!
//! 1. ignored parameters get no value;
//! 2. a contract already bound for reuse in this graph reads the binding;
//! 3. "from self" parameters (and every parameter under
//!    [`ContainerModel::Single`]) resolve in the planning tier;
//! 4. "external" parameters resolve in the named dependency tier;
//! 5. everything else goes to the next tier of the chain, except in the
//!    shared tier which resolves within itself.
//!
//! Optional parameters turn a missing contract into no value, and forget
//! the reuse bindings made while trying. Every contract looked at is
//! recorded in the [`DependencyRegister`], including the ones that turned
//! out to be missing.
//!
//! Reusable dependencies are planned in an isolated [`PlanState`] with a
//! register of their own. The compiler subscribes them with that register
//! so a change below a singleton resets its memoized instance.

use tracing::trace;

use crate::config::ContainerModel;
use crate::error::{ContractNotRegisteredError, Result, StrataError};
use crate::key::ContractKey;
use crate::plan::{DependencyRegister, Expr, PlanState};
use crate::registration::{ServiceRegistration, ServiceSource};
use crate::service::{Parameter, ParameterSource, ServiceType};
use crate::tier::{ServiceTier, TierKind};

use std::sync::Arc;

/// Plans `registration` as requested from `tier`.
pub(crate) fn plan_registration(
    tier: &ServiceTier,
    registration: &ServiceRegistration,
    register: &mut DependencyRegister,
    state: &mut PlanState,
) -> Result<Expr> {
    match registration.source() {
        ServiceSource::Instance(instance) => Ok(Expr::Constant(instance.clone())),
        ServiceSource::Factory(factory) => Ok(Expr::Invoke {
            key: registration.key().clone(),
            factory: factory.clone(),
        }),
        ServiceSource::Type(service) => {
            state.enter(tier.label(), registration.key())?;
            let planned = plan_constructor(tier, service, registration.key(), register, state);
            state.leave();
            planned
        }
    }
}

/// Looks `key` up in `tier`, falling through to the shared tier when a
/// dependency tier does not have it.
pub(crate) fn create(
    tier: &ServiceTier,
    key: &ContractKey,
    register: &mut DependencyRegister,
    state: &mut PlanState,
) -> Result<Expr> {
    register.record(key.clone());

    match tier.lookup(key) {
        Some(registration) => dependency_expr(tier, registration, register, state),
        None => match (tier.kind(), tier.shared()) {
            (TierKind::Dependency(_), Some(shared)) => {
                trace!(tier = tier.label(), contract = %key, "Falling through to shared tier");
                create(shared, key, register, state)
            }
            _ => Err(not_registered(key, tier.label(), state)),
        },
    }
}

/// Looks `key` up in `tier` only.
pub(crate) fn create_within(
    tier: &ServiceTier,
    key: &ContractKey,
    register: &mut DependencyRegister,
    state: &mut PlanState,
) -> Result<Expr> {
    register.record(key.clone());

    match tier.lookup(key) {
        Some(registration) => dependency_expr(tier, registration, register, state),
        None => Err(not_registered(key, tier.label(), state)),
    }
}

fn dependency_expr(
    tier: &ServiceTier,
    registration: Arc<ServiceRegistration>,
    register: &mut DependencyRegister,
    state: &mut PlanState,
) -> Result<Expr> {
    let memoized = registration.lifetime().is_reusable()
        && !matches!(registration.source(), ServiceSource::Instance(_));
    if !memoized {
        return plan_registration(tier, &registration, register, state);
    }

    let mut own = DependencyRegister::new();
    own.record(registration.key().clone());
    let cell = registration.instance_cell();
    let mut scope = state.isolated();
    let planned = plan_registration(tier, &registration, &mut own, &mut scope);
    register.merge(&own);
    let plan = scope.close(state, planned?);

    state.reuse_dependency(registration.clone(), own);
    Ok(Expr::Reused { registration, cell, plan: Box::new(plan) })
}

fn plan_constructor(
    tier: &ServiceTier,
    service: &ServiceType,
    contract: &ContractKey,
    register: &mut DependencyRegister,
    state: &mut PlanState,
) -> Result<Expr> {
    let ctor = service.select_constructor().ok_or_else(|| {
        StrataError::construction(
            &service.key(),
            "no eligible constructor; mark one with inject() or provide a single or parameterless one",
        )
    })?;

    let mut args = Vec::with_capacity(ctor.params.len());
    for param in ctor.params.iter() {
        let expr = if param.is_ignored() {
            Expr::Default
        } else if let Some(slot) = state.binding(param.contract()) {
            Expr::Local(slot)
        } else {
            let checkpoint = state.checkpoint();
            let resolved = match resolve_parameter(tier, param, register, state) {
                Ok(expr) => expr,
                Err(err) if param.is_optional() && err.is_contract_not_registered() => {
                    trace!(parameter = param.name(), contract = %param.contract(), "Optional parameter left empty");
                    state.rollback(checkpoint);
                    Expr::Default
                }
                Err(err) => return Err(err),
            };

            if ctor.reuses(param.contract()) && !resolved.is_default() {
                Expr::Local(state.bind(param.contract().clone(), resolved))
            } else {
                resolved
            }
        };
        args.push(expr);
    }

    Ok(Expr::New {
        service: service.clone(),
        ctor: ctor.clone(),
        contract: contract.type_id(),
        args,
    })
}

fn resolve_parameter(
    tier: &ServiceTier,
    param: &Parameter,
    register: &mut DependencyRegister,
    state: &mut PlanState,
) -> Result<Expr> {
    let key = param.contract();

    if tier.model() == ContainerModel::Single || *param.source() == ParameterSource::SelfTier {
        return create_within(tier, key, register, state);
    }

    if let ParameterSource::External(name) = param.source() {
        return match tier.find_dependency(name) {
            Some(target) => create(target, key, register, state),
            None => {
                register.record(key.clone());
                Err(not_registered(key, name, state))
            }
        };
    }

    match (tier.kind(), tier.next()) {
        (TierKind::Shared, _) | (_, None) => create_within(tier, key, register, state),
        (_, Some(next)) => create(next, key, register, state),
    }
}

fn not_registered(key: &ContractKey, tier: &str, state: &PlanState) -> StrataError {
    StrataError::ContractNotRegistered(ContractNotRegisteredError {
        contract: key.clone(),
        tier: tier.to_string(),
        required_by: state.current().cloned(),
    })
}
