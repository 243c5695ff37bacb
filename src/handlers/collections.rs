//! Collection lists and reminders

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::loan::{monthly_collections_text, DuePayment, LoanService, MonthlyFilter, MonthlyGroup};
use crate::models::ApiResponse;
use crate::reminder::{ReminderConfig, ReminderDigest};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DueQuery {
    /// Defaults to today on the business clock.
    pub as_of: Option<NaiveDate>,
}

fn monthly_filter(query: Result<Query<MonthlyFilter>, QueryRejection>) -> ApiResult<MonthlyFilter> {
    let Query(filter) = query?;
    if matches!(filter.month, Some(month) if !(1..=12).contains(&month)) {
        return Err(ApiError::BadRequest(
            "month must be between 1 and 12".to_string(),
        ));
    }
    Ok(filter)
}

/// Unpaid entries of active loans due on or before `asOf`
pub async fn list_due(
    State(service): State<Arc<LoanService>>,
    query: Result<Query<DueQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<Vec<DuePayment>>>> {
    let Query(query) = query?;
    let as_of = query.as_of.unwrap_or_else(|| service.today());
    let due = service.due_pending(as_of).await?;
    Ok(Json(ApiResponse::ok(due)))
}

pub async fn list_monthly(
    State(service): State<Arc<LoanService>>,
    query: Result<Query<MonthlyFilter>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<Vec<MonthlyGroup>>>> {
    let filter = monthly_filter(query)?;
    let groups = service.monthly_collections(&filter).await?;
    Ok(Json(ApiResponse::ok(groups)))
}

/// The monthly list as plain text
pub async fn export_monthly(
    State(service): State<Arc<LoanService>>,
    query: Result<Query<MonthlyFilter>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let filter = monthly_filter(query)?;
    let groups = service.monthly_collections(&filter).await?;
    let text = monthly_collections_text(&groups, service.today());
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text))
}

pub async fn get_reminders(
    State(service): State<Arc<LoanService>>,
    State(config): State<ReminderConfig>,
) -> ApiResult<Json<ApiResponse<ReminderDigest>>> {
    let today = service.today();
    let due = service.due_pending(today).await?;
    Ok(Json(ApiResponse::ok(ReminderDigest::build(config, today, due))))
}
