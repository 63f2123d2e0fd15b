//! # Strata Support
//!
//! Shared text helpers for the Strata IoC container.
//!
//! This crate provides:
//! - Rendering of planning paths and tier chains for error messages
//! - Short type names and "did you mean?" suggestions

pub mod rendering;
