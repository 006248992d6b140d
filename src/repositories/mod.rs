//! Repositorios
//!
//! Persistence of the order aggregate behind the `AggregateStore` seam.

pub mod aggregate_store;
pub mod memory_repository;
pub mod order_repository;

pub use aggregate_store::{AggregateStore, LiveOrderRef, OrderQueries, StoreError, SyncTransaction};
pub use memory_repository::MemoryAggregateStore;
pub use order_repository::OrderRepository;
