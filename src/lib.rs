//! ==============================================================================
//! greenhouse-host - live greenhouse sensor dashboard
//! ==============================================================================
//!
//! readings flow through the crate in one direction:
//!
//! ```text
//!     database ──► feed (latest / history) ──► aggregate ──► view ──► server
//!                         │
//!                    normalize
//! ```
//!
//! ==============================================================================

pub mod aggregate;
pub mod config;
pub mod domain;
pub mod error;
pub mod feed;
pub mod normalize;
pub mod server;
pub mod view;

pub use aggregate::{AggregationState, AggregationStore, DayBucket, GlobalExtrema, Recorded, SharedStore};
pub use domain::{DayBoundary, DayKey, RawReading, Reading};
pub use error::ReadingError;
pub use normalize::normalize;
