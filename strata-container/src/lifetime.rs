//! Instance lifetimes.
//!
//! A registration either hands out one memoized instance for every request
//! ([`Lifetime::Reusable`]) or builds a fresh object graph each time
//! ([`Lifetime::Transient`]).
use std::fmt;

/// How long an instance produced by an activator lives.
///
/// # Examples
/// ```
/// use strata_container::lifetime::Lifetime;
///
/// assert!(Lifetime::Reusable.is_reusable());
/// assert_eq!(Lifetime::from_reusable(false), Lifetime::Transient);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifetime {
    /// One instance per activator, created on first resolution.
    ///
    /// Replacing any contract the registration depends on discards the
    /// activator and with it the memoized instance.
    Reusable,

    /// A new object graph is constructed on every resolution.
    #[default]
    Transient,
}

impl Lifetime {
    #[inline]
    pub fn from_reusable(reusable: bool) -> Self {
        if reusable { Lifetime::Reusable } else { Lifetime::Transient }
    }

    #[inline]
    pub fn is_reusable(&self) -> bool {
        matches!(self, Lifetime::Reusable)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Reusable => write!(f, "Reusable"),
            Lifetime::Transient => write!(f, "Transient"),
        }
    }
}
