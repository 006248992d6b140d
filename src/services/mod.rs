//! Services module
//!
//! Lógica de negocio: reconciliación de pedidos, reportes y notificaciones.

pub mod notifier;
pub mod reconciler;
pub mod report_service;

pub use notifier::{ChangeEvent, ChangeKind, ChangeNotifier, LogNotifier, NotificationDispatcher, NotifyError, TelegramNotifier};
pub use reconciler::{ReconcileOutcome, ReconcilePolicy, Reconciler, SyncError};
pub use report_service::ReportService;
