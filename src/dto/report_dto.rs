//! Query parameters of the report endpoints

use serde::Deserialize;

/// `GET /api/report?limit=N`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecentChangesQuery {
    pub limit: Option<i64>,
}
