//! Derived views over loans: dashboard statistics, the due set, per-loan
//! summaries and the month-by-month collection list.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::model::{Loan, LoanStatus, ScheduledPayment};
use crate::format::month_name;

/// Dashboard totals. Money totals only count active loans.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoanStatistics {
    pub total_principal_active: Decimal,
    pub total_monthly_interest_active: Decimal,
    pub due_pending_this_month: u32,
    pub due_paid_this_month: u32,
    pub active_count: u32,
    pub paid_count: u32,
    pub total_count: u32,
}

impl LoanStatistics {
    pub fn compute(loans: &[Loan], today: NaiveDate) -> Self {
        let mut stats = LoanStatistics {
            total_count: loans.len() as u32,
            ..Default::default()
        };

        for loan in loans {
            match loan.status {
                LoanStatus::Paid => stats.paid_count += 1,
                LoanStatus::Active => {
                    stats.active_count += 1;
                    stats.total_principal_active += loan.principal;
                    stats.total_monthly_interest_active += loan.monthly_interest_amount;

                    for entry in loan.schedule.iter().filter(|p| same_month(p.due_date, today)) {
                        if entry.paid {
                            stats.due_paid_this_month += 1;
                        } else {
                            stats.due_pending_this_month += 1;
                        }
                    }
                }
            }
        }

        stats
    }
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

/// The part of a loan a collector needs next to a due entry.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoanRef {
    pub id: Uuid,
    pub client_name: String,
    pub phone: String,
    pub address: String,
    pub principal: Decimal,
}

impl From<&Loan> for LoanRef {
    fn from(loan: &Loan) -> Self {
        Self {
            id: loan.id,
            client_name: loan.client_name.clone(),
            phone: loan.phone.clone(),
            address: loan.address.clone(),
            principal: loan.principal,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DuePayment {
    pub loan: LoanRef,
    pub payment: ScheduledPayment,
}

/// Every unpaid entry of an active loan due on or before `as_of`.
pub fn due_pending_as_of(loans: &[Loan], as_of: NaiveDate) -> Vec<DuePayment> {
    loans
        .iter()
        .filter(|loan| loan.is_active())
        .flat_map(|loan| {
            loan.schedule
                .iter()
                .filter(move |p| !p.paid && p.due_date <= as_of)
                .map(move |p| DuePayment {
                    loan: LoanRef::from(loan),
                    payment: p.clone(),
                })
        })
        .collect()
}

/// Per-loan figures shown on the detail view and loan cards.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoanSummary {
    pub pending_count: u32,
    pub overdue_count: u32,
    pub paid_count: u32,
    pub next_payment: Option<ScheduledPayment>,
    pub interest_collected: Decimal,
    pub remaining_balance: Decimal,
}

impl LoanSummary {
    pub fn for_loan(loan: &Loan, today: NaiveDate) -> Self {
        let (paid, pending): (Vec<_>, Vec<_>) = loan.schedule.iter().partition(|p| p.paid);

        Self {
            pending_count: pending.len() as u32,
            overdue_count: pending.iter().filter(|p| p.due_date < today).count() as u32,
            paid_count: paid.len() as u32,
            next_payment: pending
                .iter()
                .min_by_key(|p| (p.due_date, p.sequence_number))
                .map(|p| (*p).clone()),
            interest_collected: paid.iter().map(|p| p.amount_due).sum(),
            remaining_balance: loan.remaining_balance(),
        }
    }
}

/// Filter for the monthly collection list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonthlyFilter {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyGroup {
    /// `YYYY-MM`
    pub key: String,
    pub year: i32,
    pub month: u32,
    pub label: String,
    pub entries: Vec<DuePayment>,
}

/// Pending entries of active loans grouped by calendar month, months
/// ascending and entries ascending by due date within each month.
pub fn monthly_collections(loans: &[Loan], filter: &MonthlyFilter) -> Vec<MonthlyGroup> {
    let mut groups: BTreeMap<(i32, u32), Vec<DuePayment>> = BTreeMap::new();

    for loan in loans.iter().filter(|loan| loan.is_active()) {
        for entry in loan.schedule.iter().filter(|p| !p.paid) {
            let (year, month) = (entry.due_date.year(), entry.due_date.month());
            if filter.year.is_some_and(|y| y != year) || filter.month.is_some_and(|m| m != month) {
                continue;
            }
            groups.entry((year, month)).or_default().push(DuePayment {
                loan: LoanRef::from(loan),
                payment: entry.clone(),
            });
        }
    }

    groups
        .into_iter()
        .map(|((year, month), mut entries)| {
            entries.sort_by_key(|e| e.payment.due_date);
            MonthlyGroup {
                key: format!("{:04}-{:02}", year, month),
                year,
                month,
                label: format!("{} {}", month_name(month), year),
                entries,
            }
        })
        .collect()
}
