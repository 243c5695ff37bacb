//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::loan::LoanService;
use crate::reminder::ReminderConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub loan_service: Arc<LoanService>,
    pub reminder: ReminderConfig,
    pub db_pool: PgPool,
}

impl AppState {
    pub fn new(loan_service: Arc<LoanService>, reminder: ReminderConfig, db_pool: PgPool) -> Self {
        Self {
            loan_service,
            reminder,
            db_pool,
        }
    }
}

impl FromRef<AppState> for Arc<LoanService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.loan_service.clone()
    }
}

impl FromRef<AppState> for ReminderConfig {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.reminder
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}
