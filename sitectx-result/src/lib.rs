//! Error types and result definitions for the sitectx crates.
//!
//! Every crate in the workspace returns [`Result<T>`] and shares the single
//! [`Error`] enum, so failures raised by operators propagate through the
//! orchestrator with `?` without conversion layers.
//!
//! # Error Categories
//!
//! - **Contract violations** ([`Error::ContractViolation`]): the calling engine
//!   broke a precondition of the execution context
//! - **User input errors** ([`Error::InvalidArgumentError`]): bad configuration
//!   or parameter values
//! - **Data format errors** ([`Error::Arrow`]): temp table batch failures
//! - **Internal errors** ([`Error::Internal`]): bugs or unexpected states

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
