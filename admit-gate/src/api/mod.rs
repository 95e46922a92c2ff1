//! HTTP API handlers for admit-gate

pub mod auth;
pub mod buildinfo;
pub mod health;
pub mod scan;
pub mod tickets;
pub mod webhook;

pub use auth::auth_middleware;
pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use scan::scan_ticket;
pub use tickets::{check_availability, create_tickets, delete_ticket, get_ticket, list_tickets};
pub use webhook::flutterwave_webhook;
