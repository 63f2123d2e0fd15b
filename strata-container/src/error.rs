//! Error types for Strata container operations.
//!
//! Every failure is raised synchronously at the point where it happens and
//! is never cached: a compilation that fails leaves the registration
//! without an activator so the next resolution starts from scratch.

use std::fmt;

use strata_support::rendering::render_path;

use crate::key::ContractKey;

/// Main error type for all Strata operations.
#[derive(Debug, thiserror::Error)]
pub enum StrataError {
    /// The root-level request has no registration.
    #[error("{}", .0)]
    ServiceNotRegistered(ServiceNotRegisteredError),

    /// A dependency could not be found anywhere along the tier chain.
    #[error("{}", .0)]
    ContractNotRegistered(ContractNotRegisteredError),

    /// Strict mode rejected a second registration for the same contract.
    #[error("{}", .0)]
    DuplicateServiceImplementation(DuplicateServiceError),

    /// The implementation type cannot be handed out as the contract.
    #[error("'{service}' cannot be assigned to '{contract}'")]
    InvalidServiceType {
        contract: ContractKey,
        service: &'static str,
    },

    /// A tier already has a contract observer.
    #[error("Contract observer is already attached to tier '{tier}' and cannot be replaced")]
    OverrideObserver { tier: String },

    /// The global accessor was used before a container was configured.
    #[error("No global container is configured. Call strata_container::global::configure() first")]
    Unconfigured,

    /// Planning re-entered a contract that is already being planned.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// A constructor or factory failed while building an instance.
    #[error("Failed to construct {key}: {source}")]
    ConstructionFailed {
        key: ContractKey,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// No dependency tier carries the requested name.
    #[error("No dependency tier is named '{name}'")]
    DependencyTierNotFound { name: String },

    /// Service names must be non-empty.
    #[error("Service name for {contract} must not be empty")]
    InvalidServiceName { contract: ContractKey },
}

impl StrataError {
    /// `true` for the "missing dependency" failure that optional
    /// parameters are allowed to swallow.
    pub fn is_contract_not_registered(&self) -> bool {
        matches!(self, StrataError::ContractNotRegistered(_))
    }

    pub(crate) fn construction(key: &ContractKey, message: impl Into<String>) -> Self {
        let message: String = message.into();
        StrataError::ConstructionFailed {
            key: key.clone(),
            source: message.into(),
        }
    }
}

/// Error when a requested service was never registered in the root tier.
#[derive(Debug)]
pub struct ServiceNotRegisteredError {
    pub requested: ContractKey,
    /// Registered contracts with similar names.
    pub suggestions: Vec<String>,
}

impl fmt::Display for ServiceNotRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Requested service of '{}' contract was not found",
            self.requested
        )?;

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: register it on the root tier or list its crate and module in the container options"
        )
    }
}

/// Error when a dependency is missing from every tier it was looked up in.
#[derive(Debug)]
pub struct ContractNotRegisteredError {
    pub contract: ContractKey,
    /// The tier that gave up on the lookup.
    pub tier: String,
    /// The contract whose constructor needed it, if known.
    pub required_by: Option<ContractKey>,
}

impl fmt::Display for ContractNotRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Contract {} was not registered with the '{}' tier",
            self.contract, self.tier
        )?;
        if let Some(parent) = &self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }
        Ok(())
    }
}

/// Error when strict mode sees a second implementation of a contract.
#[derive(Debug)]
pub struct DuplicateServiceError {
    pub contract: ContractKey,
    pub service: &'static str,
}

impl fmt::Display for DuplicateServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Duplicate service implementation: {} implements {} which is already registered",
            self.service, self.contract,
        )?;
        write!(
            f,
            "\n  Hint: use replace() to swap the implementation, or disable strict mode"
        )
    }
}

/// Error when the planner finds a dependency cycle.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// `tier:contract` labels, first and last entry are the same.
    pub chain: Vec<String>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Circular dependency detected:\n  {}", render_path(&self.chain))
    }
}

/// Convenient Result type for Strata operations.
pub type Result<T> = std::result::Result<T, StrataError>;
