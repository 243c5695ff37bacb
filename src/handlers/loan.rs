//! Loan-related API handlers

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::loan::{
    CreateLoanRequest, ExtendScheduleRequest, ListLoansQuery, Loan, LoanDetail, LoanService,
    LoanStatistics, Payment, RecordPaymentRequest, RecordPaymentResponse, RepriceRequest,
    SetPaidRequest, UpdateLoanRequest,
};
use crate::models::ApiResponse;

/// List loans, optionally filtered by text and status
pub async fn list_loans(
    State(service): State<Arc<LoanService>>,
    query: Result<Query<ListLoansQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<Vec<Loan>>>> {
    let Query(query) = query?;
    if matches!(query.limit, Some(limit) if limit < 1) {
        return Err(ApiError::BadRequest("limit must be positive".to_string()));
    }
    let loans = service.list_loans(&query).await?;
    Ok(Json(ApiResponse::ok(loans)))
}

pub async fn get_loan(
    State(service): State<Arc<LoanService>>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ApiResponse<LoanDetail>>> {
    let Path(id) = path?;
    let detail = service.get_loan_detail(id).await?;
    Ok(Json(ApiResponse::ok(detail)))
}

pub async fn create_loan(
    State(service): State<Arc<LoanService>>,
    request: Result<Json<CreateLoanRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Loan>>)> {
    let Json(request) = request?;
    let loan = service.create_loan(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(loan))))
}

pub async fn update_loan(
    State(service): State<Arc<LoanService>>,
    path: Result<Path<Uuid>, PathRejection>,
    request: Result<Json<UpdateLoanRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<Loan>>> {
    let Path(id) = path?;
    let Json(request) = request?;
    let loan = service.update_loan(id, request).await?;
    Ok(Json(ApiResponse::ok(loan)))
}

pub async fn delete_loan(
    State(service): State<Arc<LoanService>>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    if service.delete_loan(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::loan_not_found(id))
    }
}

/// Append further months to a loan's schedule
pub async fn extend_schedule(
    State(service): State<Arc<LoanService>>,
    path: Result<Path<Uuid>, PathRejection>,
    request: Result<Json<ExtendScheduleRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<Loan>>> {
    let Path(id) = path?;
    let Json(request) = request?;
    request.validate()?;
    let loan = service.extend_schedule(id, request.months).await?;
    Ok(Json(ApiResponse::ok(loan)))
}

pub async fn set_payment_paid(
    State(service): State<Arc<LoanService>>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
    request: Result<Json<SetPaidRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<Loan>>> {
    let Path((id, payment_id)) = path?;
    let Json(request) = request?;
    let loan = service
        .set_payment_paid(id, payment_id, request.paid, request.notes)
        .await?;
    Ok(Json(ApiResponse::ok(loan)))
}

pub async fn reprice_payment(
    State(service): State<Arc<LoanService>>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
    request: Result<Json<RepriceRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<Loan>>> {
    let Path((id, payment_id)) = path?;
    let Json(request) = request?;
    request.validate()?;
    let loan = service.reprice_payment(id, payment_id, request.amount).await?;
    Ok(Json(ApiResponse::ok(loan)))
}

pub async fn list_payments(
    State(service): State<Arc<LoanService>>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ApiResponse<Vec<Payment>>>> {
    let Path(id) = path?;
    let payments = service.list_payments(id).await?;
    Ok(Json(ApiResponse::ok(payments)))
}

/// Record a collection against a loan
pub async fn record_payment(
    State(service): State<Arc<LoanService>>,
    path: Result<Path<Uuid>, PathRejection>,
    request: Result<Json<RecordPaymentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<RecordPaymentResponse>>)> {
    let Path(id) = path?;
    let Json(request) = request?;
    let response = service.record_payment(id, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(response))))
}

pub async fn get_statistics(
    State(service): State<Arc<LoanService>>,
) -> ApiResult<Json<ApiResponse<LoanStatistics>>> {
    let stats = service.statistics().await?;
    Ok(Json(ApiResponse::ok(stats)))
}
