//! Construction plans and their compilation into closures.
//!
//! The planner describes how to build one registration as an [`Expr`]
//! tree. Compilation turns the tree into nested closures evaluated against
//! a frame of local slots, one slot per reuse binding.
//!
//! A reusable dependency is planned as a separate [`Plan`] with its own
//! frame and register, so its memoized instance never holds a binding of
//! the graph that happened to build it first.
//!
//! ```text
//! Block
//!   slot 0 = New(Level1Service)          ← reuse binding
//!   body   = New(Level0Service,
//!                 Local(0),
//!                 New(Level2Service, Local(0)))
//! ```

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::warn;

use crate::error::{CircularDependencyError, Result, StrataError};
use crate::key::ContractKey;
use crate::registration::{Creator, FactoryFn, ServiceRegistration};
use crate::service::{Arguments, ErasedConstructor, ErasedService, ServiceType};

// ============================================================
// DependencyRegister
// ============================================================

/// Contracts consulted while compiling one registration.
///
/// Keys are recorded even when the lookup failed, so that a later
/// registration of the missing contract invalidates the activator.
#[derive(Debug, Clone, Default)]
pub struct DependencyRegister {
    keys: HashSet<ContractKey>,
}

impl DependencyRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: ContractKey) {
        self.keys.insert(key);
    }

    /// `true` if any recorded key has the contract type of `key`,
    /// whatever its service name.
    pub fn contains_contract(&self, key: &ContractKey) -> bool {
        self.keys.iter().any(|k| k.same_contract(key))
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &ContractKey> {
        self.keys.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    /// Adds every key of `other`.
    pub(crate) fn merge(&mut self, other: &DependencyRegister) {
        self.keys.extend(other.keys.iter().cloned());
    }
}

// ============================================================
// Expr
// ============================================================

/// One node of a construction plan.
pub(crate) enum Expr {
    /// Call a constructor, then cast the instance to `contract`.
    New {
        service: ServiceType,
        ctor: ErasedConstructor,
        contract: TypeId,
        args: Vec<Expr>,
    },
    /// Call a registered factory.
    Invoke { key: ContractKey, factory: FactoryFn },
    /// A prebuilt instance.
    Constant(ErasedService),
    /// No value; ignored or unresolvable optional parameters.
    Default,
    /// Read a reuse binding.
    Local(usize),
    /// Memoize the result of a separately planned dependency in the
    /// instance cell its registration had when it was planned.
    Reused {
        registration: Arc<ServiceRegistration>,
        cell: Arc<OnceCell<ErasedService>>,
        plan: Box<Plan>,
    },
}

impl Expr {
    pub(crate) fn is_default(&self) -> bool {
        matches!(self, Expr::Default)
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::New { service, args, .. } => {
                let mut tuple = f.debug_tuple("New");
                tuple.field(&service.type_name());
                for arg in args {
                    tuple.field(arg);
                }
                tuple.finish()
            }
            Expr::Invoke { key, .. } => f.debug_tuple("Invoke").field(&key.type_name()).finish(),
            Expr::Constant(_) => f.write_str("Constant"),
            Expr::Default => f.write_str("Default"),
            Expr::Local(slot) => f.debug_tuple("Local").field(slot).finish(),
            Expr::Reused { plan, .. } => f.debug_tuple("Reused").field(plan).finish(),
        }
    }
}

// ============================================================
// PlanState
// ============================================================

/// A reusable dependency met while planning, with the contracts its own
/// plan consulted.
pub(crate) struct ReusedDependency {
    pub registration: Arc<ServiceRegistration>,
    pub register: DependencyRegister,
}

/// Position to roll a [`PlanState`] back to.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    assignments: usize,
    reused: usize,
}

/// Per-compilation planning state: reuse bindings, reusable dependencies
/// and the path used for cycle detection.
#[derive(Default)]
pub(crate) struct PlanState {
    bindings: HashMap<ContractKey, usize>,
    assignments: Vec<(usize, Expr)>,
    reused: Vec<ReusedDependency>,
    path: Vec<(String, ContractKey)>,
}

impl PlanState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A state for planning a reusable dependency: the same path, no
    /// bindings.
    pub fn isolated(&self) -> Self {
        Self { path: self.path.clone(), ..Self::default() }
    }

    /// Finishes an isolated state. Its reusable dependencies move to
    /// `parent`.
    pub fn close(mut self, parent: &mut PlanState, body: Expr) -> Plan {
        parent.reused.append(&mut self.reused);
        Plan { assignments: self.assignments, body }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint { assignments: self.assignments.len(), reused: self.reused.len() }
    }

    /// Forgets the bindings and reusable dependencies added since
    /// `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.assignments.truncate(checkpoint.assignments);
        self.bindings.retain(|_, slot| *slot < checkpoint.assignments);
        self.reused.truncate(checkpoint.reused);
    }

    pub fn reuse_dependency(&mut self, registration: Arc<ServiceRegistration>, register: DependencyRegister) {
        self.reused.push(ReusedDependency { registration, register });
    }

    pub fn take_reused(&mut self) -> Vec<ReusedDependency> {
        std::mem::take(&mut self.reused)
    }

    /// The slot bound to `contract`, if an earlier parameter bound one.
    pub fn binding(&self, contract: &ContractKey) -> Option<usize> {
        self.bindings.get(contract).copied()
    }

    /// Binds `expr` to a new slot and returns it.
    pub fn bind(&mut self, contract: ContractKey, expr: Expr) -> usize {
        let slot = self.assignments.len();
        self.assignments.push((slot, expr));
        self.bindings.insert(contract, slot);
        slot
    }

    /// Pushes `(tier, key)` on the planning path, failing if it is
    /// already there.
    pub fn enter(&mut self, tier: &str, key: &ContractKey) -> Result<()> {
        if let Some(start) = self.path.iter().position(|(t, k)| t == tier && k == key) {
            let mut chain: Vec<String> = self.path[start..]
                .iter()
                .map(|(t, k)| format!("{t}:{}", k.short_name()))
                .collect();
            chain.push(format!("{tier}:{}", key.short_name()));
            warn!(chain = ?chain, "Circular dependency detected");
            return Err(StrataError::CircularDependency(CircularDependencyError { chain }));
        }
        self.path.push((tier.to_string(), key.clone()));
        Ok(())
    }

    pub fn leave(&mut self) {
        self.path.pop();
    }

    /// The contract whose constructor is being planned.
    pub fn current(&self) -> Option<&ContractKey> {
        self.path.last().map(|(_, key)| key)
    }

    pub fn into_plan(self, body: Expr) -> Plan {
        Plan { assignments: self.assignments, body }
    }
}

// ============================================================
// Plan + compilation
// ============================================================

/// A block of reuse assignments followed by the body.
#[derive(Debug)]
pub(crate) struct Plan {
    assignments: Vec<(usize, Expr)>,
    body: Expr,
}

type Frame = [Option<ErasedService>];
type Node = Box<dyn Fn(&Frame) -> Result<Option<ErasedService>> + Send + Sync>;

impl Plan {
    pub fn bindings(&self) -> usize {
        self.assignments.len()
    }

    /// Compiles the plan into a creation function for `key`.
    pub fn compile(self, key: ContractKey) -> Creator {
        let slots = self.assignments.len();
        let assignments: Vec<(usize, Node)> = self
            .assignments
            .into_iter()
            .map(|(slot, expr)| (slot, compile_expr(expr)))
            .collect();
        let body = compile_expr(self.body);

        Arc::new(move || {
            let mut frame: Vec<Option<ErasedService>> = vec![None; slots];
            for (slot, node) in &assignments {
                let value = node(&frame)?;
                frame[*slot] = value;
            }
            body(&frame)?
                .ok_or_else(|| StrataError::construction(&key, "the plan produced no instance"))
        })
    }
}

fn compile_expr(expr: Expr) -> Node {
    match expr {
        Expr::New { service, ctor, contract, args } => {
            let args: Vec<Node> = args.into_iter().map(compile_expr).collect();
            Box::new(move |frame: &Frame| {
                let values = args
                    .iter()
                    .map(|arg| arg(frame))
                    .collect::<Result<Vec<_>>>()?;
                let mut arguments = Arguments::new(service.key(), ctor.params.clone(), values);
                let instance = (ctor.build)(&mut arguments)?;
                service
                    .cast(contract, &instance)
                    .map(Some)
                    .ok_or_else(|| StrataError::InvalidServiceType {
                        contract: service.key(),
                        service: service.type_name(),
                    })
            })
        }
        Expr::Invoke { factory, .. } => Box::new(move |_: &Frame| factory().map(Some)),
        Expr::Constant(instance) => Box::new(move |_: &Frame| Ok(Some(instance.clone()))),
        Expr::Default => Box::new(|_: &Frame| Ok(None)),
        Expr::Local(slot) => Box::new(move |frame: &Frame| Ok(frame.get(slot).cloned().flatten())),
        Expr::Reused { registration, cell, plan } => {
            let create = plan.compile(registration.key().clone());
            Box::new(move |_: &Frame| cell.get_or_try_init(|| create()).map(|instance| Some(instance.clone())))
        }
    }
}
