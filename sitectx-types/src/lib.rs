//! Shared value types for the sitectx crates.
//!
//! - [`ids`]: identifier aliases (site, partition, transaction, subquery, ...)
//! - [`unique_id`]: bit layout of transaction unique ids
//! - [`dr_timestamp`]: replication hidden timestamp codec
//! - [`params`]: fragment parameter values

pub mod dr_timestamp;
pub mod ids;
pub mod params;
pub mod unique_id;

pub use ids::*;
pub use params::{ParamValue, ParameterSet};
pub use unique_id::{EPOCH_MILLIS, UniqueIdLayout};
