//! Durable in-memory stores.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Scheduler / HTTP handlers                              │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Service Layer (services/) - ingestion and aggregation  │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Stores (repositories/)                                  │
//! │  OccupancyStore · RequestStatsStore · HistoricLedger     │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  PersistentRepository<K, V> - RwLock'd map + snapshots   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Each store is independently consistent and independently durable: a write
//! holds only its own store's lock, and a failed flush of one store never
//! affects another.
//!
//! # Recommended Usage
//! ```ignore
//! use parking_stats::config::AppConfig;
//! use parking_stats::db::RepositoryFactory;
//!
//! let config = AppConfig::load(None)?;
//! let stores = RepositoryFactory::open(&config)?;
//! // ... serve ...
//! stores.flush_all();
//! ```

pub mod factory;
pub mod repositories;
pub mod repository;

pub use factory::{RepositoryFactory, StoreSet};
pub use repositories::{
    HistoricLedger, OccupancyStore, PeakTime, PersistentRepository, RequestStatsStore,
};
pub use repository::{
    flush_all, DurableRepository, ErrorContext, RepositoryError, RepositoryResult,
};
