//! Loan route definitions

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn loan_routes() -> Router<AppState> {
    Router::new()
        .route("/api/loans", get(list_loans).post(create_loan))
        .route(
            "/api/loans/:id",
            get(get_loan).patch(update_loan).delete(delete_loan),
        )
        .route("/api/loans/:id/schedule", post(extend_schedule))
        .route(
            "/api/loans/:id/schedule/:payment_id/paid",
            put(set_payment_paid),
        )
        .route(
            "/api/loans/:id/schedule/:payment_id/amount",
            put(reprice_payment),
        )
        .route(
            "/api/loans/:id/payments",
            get(list_payments).post(record_payment),
        )
        .route("/api/stats", get(get_statistics))
}
