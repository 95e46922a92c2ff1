//! # Admit Common Library
//!
//! Shared code for the ticket admission service:
//! - Ticket store (SQLite schema, models, queries)
//! - QR token codec
//! - Caller authentication primitives
//! - Configuration loading
//! - Error types and small utilities

pub mod api;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod time;

pub use codec::QrCodec;
pub use error::{Error, Result};
pub use ids::TicketIdGenerator;
