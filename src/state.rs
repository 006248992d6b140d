//! Shared application state
//!
//! Cloned per request; holds only `Arc`s.

use std::sync::Arc;

use crate::config::EnvironmentConfig;
use crate::repositories::AggregateStore;
use crate::services::{NotificationDispatcher, ReconcilePolicy, Reconciler, ReportService};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AggregateStore>,
    pub reconciler: Arc<Reconciler>,
    pub reports: ReportService,
    pub config: Arc<EnvironmentConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn AggregateStore>, notifier: NotificationDispatcher, config: EnvironmentConfig) -> Self {
        let policy = ReconcilePolicy {
            timeout: config.sync_timeout,
            reject_stale: config.sync_reject_stale,
        };

        Self {
            reconciler: Arc::new(Reconciler::new(store.clone(), notifier, policy)),
            reports: ReportService::new(store.clone()),
            store,
            config: Arc::new(config),
        }
    }
}
