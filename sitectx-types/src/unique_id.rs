//! Bit layout of transaction unique ids.
//!
//! A unique id packs three fields into the low 63 bits of an `i64`:
//!
//! ```text
//! |-------------------- 64 bits total --------------------|
//! | unused |  timestamp   | counter | partition id |
//! | 1 bit  |   40 bits    | 9 bits  |   14 bits    |
//! ```
//!
//! The timestamp counts milliseconds since [`EPOCH_MILLIS`]. The counter
//! disambiguates ids minted within the same millisecond, and the partition id
//! names the partition that minted the id ([`MP_INIT_PID`] for multi-partition
//! transactions).

// The accessors `#[bitfield]` generates for `UniqueIdLayout` trip the
// unused_parens lint on recent toolchains.
#![allow(unused_parens)]

use modular_bitfield::prelude::*;
use sitectx_result::{Error, Result};

use crate::ids::{PartitionId, UniqueId};

/// Width of the per-millisecond counter.
pub const COUNTER_BITS: u32 = 9;

/// Width of the millisecond timestamp.
pub const TIMESTAMP_BITS: u32 = 40;

/// Width of the partition id.
pub const PARTITION_ID_BITS: u32 = 14;

/// Width of the combined timestamp and counter ("logical clock").
pub const TIMESTAMP_PLUS_COUNTER_BITS: u32 = TIMESTAMP_BITS + COUNTER_BITS;

/// Shift that moves the timestamp field down to bit zero.
pub const TIMESTAMP_SHIFT: u32 = COUNTER_BITS + PARTITION_ID_BITS;

pub const COUNTER_MAX_VALUE: i64 = (1 << COUNTER_BITS) - 1;
pub const TIMESTAMP_MAX_VALUE: i64 = (1 << TIMESTAMP_BITS) - 1;
pub const PARTITION_ID_MAX_VALUE: i64 = (1 << PARTITION_ID_BITS) - 1;
pub const TIMESTAMP_PLUS_COUNTER_MAX_VALUE: i64 = (1 << TIMESTAMP_PLUS_COUNTER_BITS) - 1;

/// Partition id stamped into unique ids minted by the multi-partition initiator.
pub const MP_INIT_PID: PartitionId = PARTITION_ID_MAX_VALUE as PartitionId;

/// Start of the unique-id clock: 2008-01-01T00:00:00Z in Unix milliseconds.
pub const EPOCH_MILLIS: i64 = 1_199_145_600_000;

/// Decomposed view of a [`UniqueId`].
#[bitfield]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u64)]
pub struct UniqueIdLayout {
    /// Minting partition (14 bits).
    pub partition_id: B14,

    /// Per-millisecond counter (9 bits).
    pub counter: B9,

    /// Milliseconds since [`EPOCH_MILLIS`] (40 bits).
    pub timestamp: B40,

    #[skip]
    __: B1,
}

impl UniqueIdLayout {
    /// View an existing unique id through the bitfield layout.
    #[inline]
    pub fn from_unique_id(id: UniqueId) -> Self {
        Self::from(id as u64)
    }

    /// Pack the layout back into a unique id.
    #[inline]
    pub fn to_unique_id(self) -> UniqueId {
        u64::from(self) as UniqueId
    }
}

/// Mint a unique id from its components.
///
/// Returns [`Error::InvalidArgumentError`] when a component does not fit its
/// field.
pub fn make_id(
    timestamp_since_epoch: i64,
    counter: i64,
    partition_id: PartitionId,
) -> Result<UniqueId> {
    if !(0..=TIMESTAMP_MAX_VALUE).contains(&timestamp_since_epoch) {
        return Err(Error::InvalidArgumentError(format!(
            "unique id timestamp {timestamp_since_epoch} does not fit in {TIMESTAMP_BITS} bits"
        )));
    }
    if !(0..=COUNTER_MAX_VALUE).contains(&counter) {
        return Err(Error::InvalidArgumentError(format!(
            "unique id counter {counter} does not fit in {COUNTER_BITS} bits"
        )));
    }
    if !(0..=PARTITION_ID_MAX_VALUE).contains(&i64::from(partition_id)) {
        return Err(Error::InvalidArgumentError(format!(
            "partition id {partition_id} does not fit in {PARTITION_ID_BITS} bits"
        )));
    }

    let layout = UniqueIdLayout::new()
        .with_timestamp(timestamp_since_epoch as u64)
        .with_counter(counter as u16)
        .with_partition_id(partition_id as u16);
    Ok(layout.to_unique_id())
}

/// Milliseconds since [`EPOCH_MILLIS`] encoded in `id`.
#[inline]
pub fn timestamp_since_epoch(id: UniqueId) -> i64 {
    UniqueIdLayout::from_unique_id(id).timestamp() as i64
}

/// Wall-clock milliseconds since the Unix epoch recovered from `id`.
///
/// This is the transaction timestamp the execution context derives when it is
/// set up for a fragment.
#[inline]
pub fn txn_timestamp_millis(id: UniqueId) -> i64 {
    (id >> TIMESTAMP_SHIFT) + EPOCH_MILLIS
}

#[inline]
pub fn counter(id: UniqueId) -> i64 {
    i64::from(UniqueIdLayout::from_unique_id(id).counter())
}

#[inline]
pub fn partition_id(id: UniqueId) -> PartitionId {
    PartitionId::from(UniqueIdLayout::from_unique_id(id).partition_id())
}

/// True when `id` was minted by the multi-partition initiator.
#[inline]
pub fn is_mp_unique_id(id: UniqueId) -> bool {
    partition_id(id) == MP_INIT_PID
}

/// Rebase a combined timestamp/counter value from the engine epoch onto the
/// Unix epoch, keeping the counter in the low [`COUNTER_BITS`].
#[inline]
pub fn ts_counter_since_unix_epoch(ts_counter: i64) -> i64 {
    (((ts_counter >> COUNTER_BITS) + EPOCH_MILLIS) << COUNTER_BITS) | (ts_counter & COUNTER_MAX_VALUE)
}
