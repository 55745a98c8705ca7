//! Repository implementations module.
//!
//! - `persistent`: the generic durable map every store is built on
//! - `occupancy`: availability means per parking lot
//! - `requests`: request counters and rolling request rates per endpoint
//! - `historic`: daily tables of raw free-spot counts
pub mod historic;
pub mod occupancy;
pub mod persistent;
pub mod requests;

pub use historic::HistoricLedger;
pub use occupancy::OccupancyStore;
pub use persistent::{CodecError, JsonCodec, PersistentRepository, SnapshotCodec};
pub use requests::{PeakTime, RequestStatsStore};
