//! Route definitions for the Sofin API

mod collections;
mod loan;

use axum::{routing::get, Router};

use crate::handlers::{health_check, root};
use crate::state::AppState;

pub use collections::collection_routes;
pub use loan::loan_routes;

/// Every route of the API, still waiting for its state
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(loan_routes())
        .merge(collection_routes())
}
