//! Identifiers shared across sitectx crates.
//!
//! These live in `sitectx-types` so the executor and context crates agree on
//! widths without depending on each other.

/// Identifier of an execution site (one per partition replica on a host).
pub type SiteId = i64;

/// Logical partition served by a site. Reassignable after context creation.
pub type PartitionId = i32;

/// Host the site runs on.
pub type HostId = i32;

/// Replication (DR) cluster identifier.
///
/// The DR hidden timestamp reserves the bits above the logical clock for the
/// cluster id, and decoding truncates it to 8 bits, so the type is `u8`.
pub type DrClusterId = u8;

/// Transaction identifier. May go backwards across multi-partition work.
pub type TxnId = i64;

/// Single-partition ordering handle ("sp handle").
pub type SpHandle = i64;

/// Globally unique id embedding a wall-clock timestamp, a counter and the
/// originating partition. See [`crate::unique_id`].
pub type UniqueId = i64;

/// Statement id inside a fragment. `0` is the enclosing statement; subqueries
/// are numbered from `1`.
pub type SubqueryId = i32;

/// Token identifying an undo quantum in the external undo log.
pub type UndoToken = i64;

/// Subquery id of the top-level statement of a fragment.
pub const TOP_LEVEL_STATEMENT_ID: SubqueryId = 0;
