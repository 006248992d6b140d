//! Data Transfer Objects
//!
//! Wire shapes of the HTTP surface.

pub mod api_response;
pub mod report_dto;
pub mod sync_dto;

pub use api_response::{ApiResponse, ListResponse};
pub use report_dto::RecentChangesQuery;
pub use sync_dto::{SyncContainerRequest, SyncOrderRequest, SyncTaskRequest};
