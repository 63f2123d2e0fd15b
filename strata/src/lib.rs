//! # Strata: tiered inversion-of-control container for Rust
//!
//! Services are requested from a root tier. Their constructor parameters
//! come from a chain of named dependency tiers that ends in a shared tier.
//! Each root registration is compiled into an activator on first use, and
//! the activator is dropped again whenever a contract it relied on
//! changes.
//!
//! ```rust
//! use strata::prelude::*;
//!
//! trait Clock: Send + Sync {
//!     fn now(&self) -> u64;
//! }
//!
//! #[derive(Default)]
//! struct FixedClock;
//!
//! impl Clock for FixedClock {
//!     fn now(&self) -> u64 { 42 }
//! }
//!
//! impl Injectable for FixedClock {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::default_new()]
//!     }
//!     fn contracts(casts: &mut Casts<Self>) {
//!         casts.add::<dyn Clock>(|s| s);
//!     }
//! }
//!
//! let container = Container::builder().build().unwrap();
//! container.root().add_singleton::<dyn Clock, FixedClock>().unwrap();
//! assert_eq!(container.get_service::<dyn Clock>().unwrap().now(), 42);
//! ```

pub use strata_container::*;
pub use strata_support as support;
