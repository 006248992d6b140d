//! Modelos del sistema
//!
//! Domain types for the order aggregate and the read-side projections.

pub mod container;
pub mod order;
pub mod report;
pub mod task;

pub use container::Container;
pub use order::{Order, OrderAggregate, OrderStatus, StoredAggregate, StoredOrder, UnknownOrderStatus};
pub use report::{OrderStatistics, OverdueTask};
pub use task::{InvalidTaskStatus, Task, TaskStatus};
