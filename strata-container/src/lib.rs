//! Core container implementation for Strata IoC.

mod compiler;
pub mod config;
pub mod container;
pub mod decorator;
pub mod error;
pub mod global;
pub mod key;
pub mod lifetime;
pub mod notifier;
pub mod plan;
mod planner;
pub mod provider;
pub mod registration;
pub mod registry;
pub mod scan;
pub mod service;
pub mod tier;

pub use container::prelude;
pub use error::{Result, StrataError};
pub use key::ContractKey;
pub use lifetime::Lifetime;

#[doc(hidden)]
pub use inventory;
