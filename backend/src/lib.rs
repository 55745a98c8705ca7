//! # Parking Statistics Backend
//!
//! Occupancy and request statistics for a network of parking lots.
//!
//! Periodic snapshots of every lot's free spots are folded into time-bucketed
//! means per day of week, and recorded raw into one table per calendar day.
//! The HTTP API serves both, and counts its own traffic per endpoint and per
//! bucket of the day.
//!
//! ## Architecture
//!
//! - [`models`]: Bucketing arithmetic and the stored record types
//! - [`db`]: Durable in-memory stores with JSON snapshots
//! - [`services`]: Ingestion and read-side statistics
//! - [`scheduler`]: Ingestion, request cycle and flush jobs
//! - [`config`]: TOML configuration with environment overrides
//! - [`http`]: Axum-based HTTP server and request handlers
//!
//! State is never global: the stores are created once by
//! [`db::RepositoryFactory`] and handed to every component that needs them.

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod config;
pub mod db;
pub mod models;
pub mod scheduler;
pub mod services;

#[cfg(feature = "http-server")]
pub mod http;
