//! Replication (DR) hidden timestamp codec.
//!
//! Every row written to a replicated stream carries a hidden column holding
//! the originating cluster id and the logical clock of the writing
//! transaction, so clusters can order conflicting changes:
//!
//! ```text
//! |--------------- 64 bits total ---------------|
//! | cluster id |  timestamp + counter (logical) |
//! |  15 bits   |            49 bits             |
//! ```
//!
//! The logical clock is the unique id with its partition bits shifted out.

use crate::ids::{DrClusterId, UniqueId};
use crate::unique_id::{
    COUNTER_BITS, PARTITION_ID_BITS, TIMESTAMP_PLUS_COUNTER_BITS,
    TIMESTAMP_PLUS_COUNTER_MAX_VALUE, ts_counter_since_unix_epoch,
};

/// Bit offset of the cluster id inside the hidden value.
pub const CLUSTER_ID_SHIFT: u32 = TIMESTAMP_PLUS_COUNTER_BITS;

/// Build the hidden timestamp for rows written by `unique_id` on `cluster_id`.
#[inline]
pub fn encode(cluster_id: DrClusterId, unique_id: UniqueId) -> i64 {
    (i64::from(cluster_id) << CLUSTER_ID_SHIFT) | (unique_id >> PARTITION_ID_BITS)
}

/// Raw timestamp/counter bits of a hidden value, still relative to the engine
/// epoch.
#[inline]
pub fn ts_counter(hidden: i64) -> i64 {
    hidden & TIMESTAMP_PLUS_COUNTER_MAX_VALUE
}

/// Logical clock of a hidden value, rebased onto the Unix epoch.
///
/// The result keeps the counter in its low bits; use [`timestamp_millis`] to
/// drop it.
#[inline]
pub fn decode_logical_clock(hidden: i64) -> i64 {
    ts_counter_since_unix_epoch(ts_counter(hidden))
}

/// Cluster id that produced a hidden value.
#[inline]
pub fn decode_cluster_id(hidden: i64) -> DrClusterId {
    (hidden >> CLUSTER_ID_SHIFT) as DrClusterId
}

/// Wall-clock milliseconds of a decoded logical clock.
#[inline]
pub fn timestamp_millis(logical_clock: i64) -> i64 {
    logical_clock >> COUNTER_BITS
}
