pub mod auth;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod notifications;
pub mod openapi;
pub mod scheduler;
pub mod startup;
pub mod store;

use std::sync::Arc;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use handlers::MetricsState;

use engine::{Lifecycle, Notifier};
use models::SwapKind;
use store::{MatchStore, PgLeaveSource, PgMatchStore, PgSwapSource, LEAVE_TABLES, SHIFT_TABLES};

pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: AppConfig,
    pub metrics: Arc<MetricsState>,
    pub notifier: Arc<dyn Notifier>,
    pub shift_source: PgSwapSource,
    pub shift_matches: PgMatchStore,
    pub leave_source: PgLeaveSource,
    pub leave_matches: PgMatchStore,
}

impl AppState {
    pub fn new(
        db: sqlx::PgPool,
        config: AppConfig,
        metrics: Arc<MetricsState>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            shift_source: PgSwapSource::new(db.clone()),
            shift_matches: PgMatchStore::new(db.clone(), &SHIFT_TABLES),
            leave_source: PgLeaveSource::new(db.clone()),
            leave_matches: PgMatchStore::new(db.clone(), &LEAVE_TABLES),
            db,
            config,
            metrics,
            notifier,
        }
    }

    pub fn match_store(&self, kind: SwapKind) -> &dyn MatchStore {
        match kind {
            SwapKind::Shifts => &self.shift_matches,
            SwapKind::Leave => &self.leave_matches,
        }
    }

    pub fn lifecycle(&self, kind: SwapKind) -> Lifecycle<'_> {
        Lifecycle::new(kind, self.match_store(kind), self.notifier.as_ref())
    }
}
