//! Loan models and request/response DTOs for Sofin

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::schedule::{fits_column, AMOUNT_SCALE, MAX_AMOUNT, MAX_RATE_PERCENT, RATE_SCALE};

/// Loan status. Stored in Postgres with the business' own labels.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "loan_status")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    #[sqlx(rename = "activo")]
    #[serde(alias = "activo")]
    Active,
    #[sqlx(rename = "pagado")]
    #[serde(alias = "pagado")]
    Paid,
}

/// One expected monthly interest collection.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledPayment {
    pub id: Uuid,
    pub sequence_number: i32,
    pub due_date: NaiveDate,
    pub amount_due: Decimal,
    pub paid: bool,
    pub paid_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// A scheduled payment row tagged with its owning loan, used when the
/// schedules of many loans are fetched in one query.
#[derive(Debug, sqlx::FromRow)]
pub struct ScheduleRow {
    pub loan_id: Uuid,
    #[sqlx(flatten)]
    pub payment: ScheduledPayment,
}

/// `loans` table row. The schedule lives in its own table.
#[derive(Debug, sqlx::FromRow)]
pub struct LoanRow {
    pub id: Uuid,
    pub client_name: String,
    pub phone: String,
    pub address: String,
    pub id_photo: Option<String>,
    pub request_date: NaiveDate,
    pub principal: Decimal,
    pub interest_rate_percent: Decimal,
    pub monthly_interest_amount: Decimal,
    pub status: LoanStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Loan model, owning its payment schedule.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: Uuid,
    pub client_name: String,
    pub phone: String,
    pub address: String,
    pub id_photo: Option<String>,
    pub request_date: NaiveDate,
    pub principal: Decimal,
    pub interest_rate_percent: Decimal,
    pub monthly_interest_amount: Decimal,
    pub status: LoanStatus,
    pub schedule: Vec<ScheduledPayment>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    pub fn from_row(row: LoanRow, schedule: Vec<ScheduledPayment>) -> Self {
        Self {
            id: row.id,
            client_name: row.client_name,
            phone: row.phone,
            address: row.address,
            id_photo: row.id_photo,
            request_date: row.request_date,
            principal: row.principal,
            interest_rate_percent: row.interest_rate_percent,
            monthly_interest_amount: row.monthly_interest_amount,
            status: row.status,
            schedule,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }
}

/// Recorded collection ("abono") against a loan.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub kind: String,
    pub notes: Option<String>,
    pub unapplied_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

pub const DEFAULT_PAYMENT_KIND: &str = "efectivo";

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn money(value: &Decimal) -> Result<(), ValidationError> {
    if !fits_column(*value, AMOUNT_SCALE, MAX_AMOUNT) {
        return Err(ValidationError::new("amount_out_of_range"));
    }
    Ok(())
}

fn positive_amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("must_be_positive"));
    }
    money(value)
}

fn non_negative_amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("must_not_be_negative"));
    }
    money(value)
}

fn rate_percent(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("must_not_be_negative"));
    }
    if !fits_column(*value, RATE_SCALE, MAX_RATE_PERCENT) {
        return Err(ValidationError::new("rate_out_of_range"));
    }
    Ok(())
}

/// Request to register a new loan
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoanRequest {
    #[validate(custom = "not_blank")]
    pub client_name: String,
    #[validate(custom = "not_blank")]
    pub phone: String,
    #[validate(custom = "not_blank")]
    pub address: String,
    pub id_photo: Option<String>,
    #[validate(required)]
    pub request_date: Option<NaiveDate>,
    #[validate(required, custom = "positive_amount")]
    pub principal: Option<Decimal>,
    #[validate(required, custom = "rate_percent")]
    pub interest_rate_percent: Option<Decimal>,
    pub notes: Option<String>,
}

/// Partial update of a loan. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLoanRequest {
    #[validate(custom = "not_blank")]
    pub client_name: Option<String>,
    #[validate(custom = "not_blank")]
    pub phone: Option<String>,
    #[validate(custom = "not_blank")]
    pub address: Option<String>,
    /// An empty string removes the stored photo.
    pub id_photo: Option<String>,
    pub notes: Option<String>,
    pub status: Option<LoanStatus>,
    #[validate(custom = "positive_amount")]
    pub principal: Option<Decimal>,
    #[validate(custom = "rate_percent")]
    pub interest_rate_percent: Option<Decimal>,
}

impl UpdateLoanRequest {
    pub fn changes_terms(&self) -> bool {
        self.principal.is_some() || self.interest_rate_percent.is_some()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ExtendScheduleRequest {
    #[validate(range(min = 1, max = 120))]
    pub months: u32,
}

#[derive(Debug, Deserialize)]
pub struct SetPaidRequest {
    pub paid: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RepriceRequest {
    #[validate(custom = "non_negative_amount")]
    pub amount: Decimal,
}

/// Request to record a collection against a loan
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentRequest {
    #[validate(custom = "positive_amount")]
    pub amount: Decimal,
    /// Defaults to today on the business clock.
    pub payment_date: Option<NaiveDate>,
    pub kind: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentResponse {
    pub payment: Payment,
    pub settled_payment_ids: Vec<Uuid>,
    pub remaining_balance: Decimal,
    pub status: LoanStatus,
}

/// Query for listing loans
#[derive(Debug, Default, Deserialize)]
pub struct ListLoansQuery {
    /// Case-insensitive match on client name, phone or address.
    pub q: Option<String>,
    pub status: Option<LoanStatus>,
    pub limit: Option<i64>,
}
