//! Loan service layer - Business logic for loan management
//!
//! Every mutation locks the loan row, applies one of the in-memory schedule
//! operations and writes the loan back inside the same transaction.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use super::model::{
    CreateLoanRequest, ListLoansQuery, Loan, LoanRow, LoanStatus, Payment, RecordPaymentRequest,
    RecordPaymentResponse, ScheduleRow, ScheduledPayment, UpdateLoanRequest,
    DEFAULT_PAYMENT_KIND,
};
use super::schedule::{generate, monthly_interest};
use super::stats::{
    due_pending_as_of, monthly_collections, DuePayment, LoanStatistics, LoanSummary,
    MonthlyFilter, MonthlyGroup,
};
use crate::clock::BusinessClock;
use crate::error::{ApiError, ApiResult};
use crate::format::format_percent;

/// Loan with everything the detail view shows.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanDetail {
    #[serde(flatten)]
    pub loan: Loan,
    pub payments: Vec<Payment>,
    pub summary: LoanSummary,
}

/// Loan service for managing loan lifecycle
#[derive(Clone)]
pub struct LoanService {
    db_pool: PgPool,
    clock: BusinessClock,
    schedule_months: u32,
}

impl LoanService {
    /// Create a new loan service instance
    pub fn new(db_pool: PgPool, clock: BusinessClock, schedule_months: u32) -> Self {
        Self {
            db_pool,
            clock,
            schedule_months,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Register a new loan with its initial schedule
    pub async fn create_loan(&self, request: CreateLoanRequest) -> ApiResult<Loan> {
        request.validate()?;
        let (Some(request_date), Some(principal), Some(rate)) = (
            request.request_date,
            request.principal,
            request.interest_rate_percent,
        ) else {
            return Err(ApiError::ValidationError(
                "requestDate, principal and interestRatePercent are required".to_string(),
            ));
        };

        let monthly = monthly_interest(principal, rate);
        let now = self.clock.now();
        let loan = Loan {
            id: Uuid::new_v4(),
            client_name: request.client_name.trim().to_string(),
            phone: request.phone.trim().to_string(),
            address: request.address.trim().to_string(),
            id_photo: request.id_photo.filter(|p| !p.is_empty()),
            request_date,
            principal,
            interest_rate_percent: rate,
            monthly_interest_amount: monthly,
            status: LoanStatus::Active,
            schedule: generate(request_date, monthly, self.schedule_months)?,
            notes: request.notes.filter(|n| !n.trim().is_empty()),
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db_pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO loans (
                id, client_name, phone, address, id_photo, request_date,
                principal, interest_rate_percent, monthly_interest_amount,
                status, notes, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(loan.id)
        .bind(&loan.client_name)
        .bind(&loan.phone)
        .bind(&loan.address)
        .bind(&loan.id_photo)
        .bind(loan.request_date)
        .bind(loan.principal)
        .bind(loan.interest_rate_percent)
        .bind(loan.monthly_interest_amount)
        .bind(loan.status)
        .bind(&loan.notes)
        .bind(loan.created_at)
        .bind(loan.updated_at)
        .execute(&mut *tx)
        .await?;

        save_schedule(&mut tx, loan.id, &loan.schedule).await?;
        let stored = fetch_loan(&mut tx, loan.id, false).await?;
        tx.commit().await?;

        tracing::info!(
            loan_id = %stored.id,
            principal = %stored.principal,
            rate = %format_percent(stored.interest_rate_percent),
            monthly_interest = %stored.monthly_interest_amount,
            entries = stored.schedule.len(),
            "Loan created"
        );

        Ok(stored)
    }

    /// Get loan by ID
    pub async fn get_loan(&self, id: Uuid) -> ApiResult<Loan> {
        let mut conn = self.db_pool.acquire().await?;
        fetch_loan(&mut conn, id, false).await
    }

    /// Loan with its recorded payments and derived figures
    pub async fn get_loan_detail(&self, id: Uuid) -> ApiResult<LoanDetail> {
        let loan = self.get_loan(id).await?;
        let payments = self.fetch_payments(id).await?;
        let summary = LoanSummary::for_loan(&loan, self.today());
        Ok(LoanDetail {
            loan,
            payments,
            summary,
        })
    }

    /// List loans, newest first
    pub async fn list_loans(&self, query: &ListLoansQuery) -> ApiResult<Vec<Loan>> {
        let pattern = query
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(q)));
        let limit = query.limit.filter(|l| *l > 0);

        let rows = sqlx::query_as::<_, LoanRow>(
            r#"
            SELECT * FROM loans
            WHERE ($1::loan_status IS NULL OR status = $1)
              AND ($2::text IS NULL
                   OR client_name ILIKE $2
                   OR phone ILIKE $2
                   OR address ILIKE $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(query.status)
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await?;

        self.attach_schedules(rows).await
    }

    async fn active_loans(&self) -> ApiResult<Vec<Loan>> {
        self.list_loans(&ListLoansQuery {
            status: Some(LoanStatus::Active),
            ..Default::default()
        })
        .await
    }

    async fn attach_schedules(&self, rows: Vec<LoanRow>) -> ApiResult<Vec<Loan>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let entries = sqlx::query_as::<_, ScheduleRow>(
            "SELECT * FROM scheduled_payments WHERE loan_id = ANY($1) ORDER BY loan_id, sequence_number",
        )
        .bind(&ids)
        .fetch_all(&self.db_pool)
        .await?;

        let mut by_loan: HashMap<Uuid, Vec<ScheduledPayment>> = HashMap::new();
        for entry in entries {
            by_loan.entry(entry.loan_id).or_default().push(entry.payment);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let schedule = by_loan.remove(&row.id).unwrap_or_default();
                Loan::from_row(row, schedule)
            })
            .collect())
    }

    /// Merge the given fields into the loan. Changing principal or rate
    /// re-prices every pending entry.
    pub async fn update_loan(&self, id: Uuid, request: UpdateLoanRequest) -> ApiResult<Loan> {
        request.validate()?;
        let reprices = request.changes_terms();

        let (loan, ()) = self
            .mutate(id, "update", move |loan| {
                if let Some(name) = request.client_name {
                    loan.client_name = name.trim().to_string();
                }
                if let Some(phone) = request.phone {
                    loan.phone = phone.trim().to_string();
                }
                if let Some(address) = request.address {
                    loan.address = address.trim().to_string();
                }
                if let Some(photo) = request.id_photo {
                    loan.id_photo = Some(photo).filter(|p| !p.is_empty());
                }
                if let Some(notes) = request.notes {
                    loan.notes = Some(notes).filter(|n| !n.trim().is_empty());
                }
                if reprices {
                    loan.edit_terms(request.principal, request.interest_rate_percent)?;
                }
                if let Some(status) = request.status {
                    loan.status = status;
                }
                Ok(())
            })
            .await?;

        if reprices {
            tracing::info!(
                loan_id = %id,
                monthly_interest = %loan.monthly_interest_amount,
                "Pending entries re-priced"
            );
        }
        Ok(loan)
    }

    /// Delete a loan with its schedule and payments. `false` when absent.
    pub async fn delete_loan(&self, id: Uuid) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(id)
            .execute(&self.db_pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(loan_id = %id, "Loan deleted");
        }
        Ok(deleted)
    }

    pub async fn extend_schedule(&self, id: Uuid, months: u32) -> ApiResult<Loan> {
        let (loan, ()) = self
            .mutate(id, "extend_schedule", move |loan| {
                Ok(loan.append_months(months)?)
            })
            .await?;
        Ok(loan)
    }

    pub async fn set_payment_paid(
        &self,
        id: Uuid,
        payment_id: Uuid,
        paid: bool,
        notes: Option<String>,
    ) -> ApiResult<Loan> {
        let today = self.today();
        let (loan, ()) = self
            .mutate(id, "set_payment_paid", move |loan| {
                Ok(loan.set_paid(payment_id, paid, notes, today)?)
            })
            .await?;
        Ok(loan)
    }

    pub async fn reprice_payment(
        &self,
        id: Uuid,
        payment_id: Uuid,
        amount: Decimal,
    ) -> ApiResult<Loan> {
        let (loan, ()) = self
            .mutate(id, "reprice_payment", move |loan| {
                Ok(loan.reprice(payment_id, amount)?)
            })
            .await?;
        Ok(loan)
    }

    /// Lock, modify and write back one loan in a single transaction.
    async fn mutate<T, F>(&self, id: Uuid, action: &'static str, apply: F) -> ApiResult<(Loan, T)>
    where
        F: FnOnce(&mut Loan) -> ApiResult<T> + Send,
        T: Send,
    {
        let mut tx = self.db_pool.begin().await?;
        let mut loan = fetch_loan(&mut tx, id, true).await?;

        let out = apply(&mut loan)?;
        loan.updated_at = self.clock.now();
        save_loan(&mut tx, &loan).await?;

        let stored = fetch_loan(&mut tx, id, false).await?;
        tx.commit().await?;

        tracing::info!(loan_id = %id, action, status = ?stored.status, "Loan updated");
        Ok((stored, out))
    }

    /// Recorded payments for a loan, newest first
    pub async fn list_payments(&self, id: Uuid) -> ApiResult<Vec<Payment>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM loans WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.db_pool)
            .await?;
        if !exists {
            return Err(ApiError::loan_not_found(id));
        }
        self.fetch_payments(id).await
    }

    async fn fetch_payments(&self, id: Uuid) -> ApiResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE loan_id = $1 ORDER BY payment_date DESC, created_at DESC",
        )
        .bind(id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(payments)
    }

    /// Record a collection and settle the schedule entries it covers.
    ///
    /// The payment row and the schedule changes commit together or not at
    /// all; a missing loan writes nothing.
    pub async fn record_payment(
        &self,
        id: Uuid,
        request: RecordPaymentRequest,
    ) -> ApiResult<RecordPaymentResponse> {
        request.validate()?;
        let paid_on = request.payment_date.unwrap_or_else(|| self.today());

        let mut tx = self.db_pool.begin().await?;
        let mut loan = match fetch_loan(&mut tx, id, true).await {
            Ok(loan) => loan,
            Err(err) => {
                tx.rollback().await?;
                tracing::warn!(loan_id = %id, error = %err, "Payment rejected");
                return Err(err);
            }
        };

        let (settled, unapplied) = loan.settle(request.amount, paid_on)?;

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                id, loan_id, amount, payment_date, kind, notes, unapplied_amount, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(request.amount)
        .bind(paid_on)
        .bind(
            request
                .kind
                .filter(|k| !k.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PAYMENT_KIND.to_string()),
        )
        .bind(request.notes.filter(|n| !n.trim().is_empty()))
        .bind(unapplied)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        loan.updated_at = self.clock.now();
        save_loan(&mut tx, &loan).await?;
        tx.commit().await?;

        tracing::info!(
            loan_id = %id,
            payment_id = %payment.id,
            amount = %payment.amount,
            settled = settled.len(),
            status = ?loan.status,
            "Payment recorded"
        );

        Ok(RecordPaymentResponse {
            remaining_balance: loan.remaining_balance(),
            status: loan.status,
            settled_payment_ids: settled,
            payment,
        })
    }

    pub async fn statistics(&self) -> ApiResult<LoanStatistics> {
        let loans = self.list_loans(&ListLoansQuery::default()).await?;
        Ok(LoanStatistics::compute(&loans, self.today()))
    }

    /// Unpaid entries of active loans due on or before `as_of`
    pub async fn due_pending(&self, as_of: NaiveDate) -> ApiResult<Vec<DuePayment>> {
        let loans = self.active_loans().await?;
        Ok(due_pending_as_of(&loans, as_of))
    }

    pub async fn monthly_collections(&self, filter: &MonthlyFilter) -> ApiResult<Vec<MonthlyGroup>> {
        let loans = self.active_loans().await?;
        Ok(monthly_collections(&loans, filter))
    }
}

async fn fetch_loan(conn: &mut PgConnection, id: Uuid, for_update: bool) -> ApiResult<Loan> {
    let sql = if for_update {
        "SELECT * FROM loans WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT * FROM loans WHERE id = $1"
    };

    let row = sqlx::query_as::<_, LoanRow>(sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::loan_not_found(id))?;

    let schedule = sqlx::query_as::<_, ScheduledPayment>(
        "SELECT * FROM scheduled_payments WHERE loan_id = $1 ORDER BY sequence_number",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Loan::from_row(row, schedule))
}

async fn save_loan(conn: &mut PgConnection, loan: &Loan) -> ApiResult<()> {
    sqlx::query(
        r#"
        UPDATE loans
        SET client_name = $1, phone = $2, address = $3, id_photo = $4,
            principal = $5, interest_rate_percent = $6, monthly_interest_amount = $7,
            status = $8, notes = $9, updated_at = $10
        WHERE id = $11
        "#,
    )
    .bind(&loan.client_name)
    .bind(&loan.phone)
    .bind(&loan.address)
    .bind(&loan.id_photo)
    .bind(loan.principal)
    .bind(loan.interest_rate_percent)
    .bind(loan.monthly_interest_amount)
    .bind(loan.status)
    .bind(&loan.notes)
    .bind(loan.updated_at)
    .bind(loan.id)
    .execute(&mut *conn)
    .await?;

    save_schedule(conn, loan.id, &loan.schedule).await
}

async fn save_schedule(
    conn: &mut PgConnection,
    loan_id: Uuid,
    schedule: &[ScheduledPayment],
) -> ApiResult<()> {
    for entry in schedule {
        sqlx::query(
            r#"
            INSERT INTO scheduled_payments (
                id, loan_id, sequence_number, due_date, amount_due, paid, paid_date, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE
            SET amount_due = EXCLUDED.amount_due,
                paid = EXCLUDED.paid,
                paid_date = EXCLUDED.paid_date,
                notes = EXCLUDED.notes
            "#,
        )
        .bind(entry.id)
        .bind(loan_id)
        .bind(entry.sequence_number)
        .bind(entry.due_date)
        .bind(entry.amount_due)
        .bind(entry.paid)
        .bind(entry.paid_date)
        .bind(&entry.notes)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Escape `%`, `_` and `\` so user input matches literally inside ILIKE.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
