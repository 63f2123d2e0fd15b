//! Contract identification keys.
//!
//! [`ContractKey`] identifies a contract within a tier. It combines a
//! [`TypeId`] with an optional service name for named registrations.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use strata_support::rendering::short_type_name;

/// Identifies a contract (usually a `dyn Trait`) and, optionally, one
/// named registration of it.
///
/// # Examples
/// ```
/// use strata_container::key::ContractKey;
///
/// trait Employee {}
///
/// let key = ContractKey::of::<dyn Employee>();
/// assert!(key.type_name().contains("Employee"));
/// assert_eq!(key.name(), None);
///
/// let senior = ContractKey::named::<dyn Employee>("Senior");
/// assert_eq!(senior.name(), Some("Senior"));
/// assert_ne!(key, senior);
/// assert!(key.same_contract(&senior));
/// ```
#[derive(Clone)]
pub struct ContractKey {
    type_id: TypeId,
    type_name: &'static str,
    name: Option<Arc<str>>,
}

impl ContractKey {
    /// Creates the key of the default registration of `C`.
    #[inline]
    pub fn of<C: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            type_name: type_name::<C>(),
            name: None,
        }
    }

    /// Creates the key of the registration of `C` named `name`.
    #[inline]
    pub fn named<C: ?Sized + 'static>(name: impl Into<Arc<str>>) -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            type_name: type_name::<C>(),
            name: Some(name.into()),
        }
    }

    /// Creates a key from a raw [`TypeId`] and type name.
    #[inline]
    pub fn from_raw(type_id: TypeId, type_name: &'static str) -> Self {
        Self { type_id, type_name, name: None }
    }

    /// Returns the same contract with a different service name.
    pub fn with_name(&self, name: Option<&str>) -> Self {
        Self {
            type_id: self.type_id,
            type_name: self.type_name,
            name: name.map(Arc::from),
        }
    }

    /// Returns the unnamed key of this contract.
    pub fn contract(&self) -> Self {
        self.with_name(None)
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name, as produced by [`std::any::type_name`].
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The type name without module paths.
    pub fn short_name(&self) -> String {
        short_type_name(self.type_name)
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// `true` if both keys refer to the same contract type, whatever
    /// their service names.
    #[inline]
    pub fn same_contract(&self, other: &ContractKey) -> bool {
        self.type_id == other.type_id
    }
}

impl PartialEq for ContractKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name == other.name
    }
}

impl Eq for ContractKey {}

impl Hash for ContractKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Debug for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "ContractKey({}, name={:?})", self.type_name, name),
            None => write!(f, "ContractKey({})", self.type_name),
        }
    }
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} (name={:?})", self.type_name, name),
            None => write!(f, "{}", self.type_name),
        }
    }
}
