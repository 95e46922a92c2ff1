//! Ticket store: schema initialization, models, and queries

pub mod init;
pub mod models;
pub mod tickets;

pub use init::*;
pub use models::*;
