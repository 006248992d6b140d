//! Logistics order synchronization service
//!
//! Accepts full order aggregates (order, containers, tasks) from the client of
//! record, reconciles them atomically into the order store and serves
//! read-only reports over committed state.

pub mod config;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use routes::create_router;
pub use state::AppState;
