//! Collection and reminder route definitions

use axum::{routing::get, Router};

use crate::handlers::*;
use crate::state::AppState;

pub fn collection_routes() -> Router<AppState> {
    Router::new()
        .route("/api/collections/due", get(list_due))
        .route("/api/collections/monthly", get(list_monthly))
        .route("/api/collections/monthly/text", get(export_monthly))
        .route("/api/reminders", get(get_reminders))
}
