//! Compilation of root registrations into activators.
//!
//! A registration is compiled the first time it is requested and again
//! after every invalidation. Compilation is single-flight per
//! registration: concurrent callers wait on the registration's compile
//! lock and then pick up the cached activator.
//!
//! Reusable dependencies met while planning are subscribed too, each with
//! the register of its own plan. A change below a singleton then resets
//! the singleton's instance as well as the activators built on it.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::Result;
use crate::notifier::ServiceNotifier;
use crate::plan::{DependencyRegister, PlanState};
use crate::planner;
use crate::registration::{Activator, ServiceRegistration};
use crate::tier::ServiceTier;

/// Returns the activator of `registration`, compiling it if needed.
///
/// On failure nothing is cached and the next call starts over.
#[instrument(skip_all, fields(contract = %registration.key(), tier = tier.label()))]
pub(crate) fn compile(
    tier: &ServiceTier,
    notifier: &ServiceNotifier,
    registration: &Arc<ServiceRegistration>,
) -> Result<Arc<Activator>> {
    if let Some(activator) = registration.cached_activator() {
        return Ok(activator);
    }

    let _guard = registration.lock_compile();
    if let Some(activator) = registration.cached_activator() {
        return Ok(activator);
    }

    notifier.subscribe(registration);
    let epoch = notifier.epoch();

    let mut register = DependencyRegister::new();
    register.record(registration.key().clone());
    let mut state = PlanState::new();

    let body = planner::plan_registration(tier, registration, &mut register, &mut state)?;
    let reused = state.take_reused();
    let plan = state.into_plan(body);
    let bindings = plan.bindings();
    let create = plan.compile(registration.key().clone());

    let activator = Arc::new(Activator::new(
        create,
        registration.lifetime(),
        registration.instance_cell(),
    ));

    for dependency in &reused {
        dependency.registration.store_register(dependency.register.clone());
        notifier.subscribe(&dependency.registration);
    }

    let dependencies = register.len();
    registration.store_register(register);
    let cached = registration.store_activator(activator.clone(), || notifier.epoch() == epoch);
    if !cached {
        // The plan may have read registrations that changed since; keep
        // its singletons out of the cells later plans will use.
        for dependency in &reused {
            dependency.registration.reset_instance();
        }
    }

    debug!(dependencies, bindings, singletons = reused.len(), cached, "Compiled activator");
    Ok(activator)
}
