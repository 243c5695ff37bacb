//! Payment schedule generation and mutation
//!
//! Everything in here is pure: it works on an in-memory [`Loan`] and leaves
//! persistence and timestamps to the service layer.

use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use uuid::Uuid;

use super::model::{Loan, LoanStatus, ScheduledPayment};

/// Number of monthly entries generated for a new loan.
pub const DEFAULT_SCHEDULE_MONTHS: u32 = 12;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Scheduled payment {0} not found")]
    PaymentNotFound(Uuid),

    #[error("Loan has no scheduled payments")]
    EmptySchedule,

    #[error("Invalid number of months: {0}")]
    InvalidCount(u32),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Due date out of calendar range")]
    DateOverflow,
}

/// Exclusive upper bound of a money column, `NUMERIC(14, 2)`.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);
pub const AMOUNT_SCALE: u32 = 2;

/// Exclusive upper bound of `interest_rate_percent`, `NUMERIC(7, 4)`.
pub const MAX_RATE_PERCENT: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);
pub const RATE_SCALE: u32 = 4;

/// Whether `value` is stored without rounding in a column of the given
/// scale and exclusive bound. Trailing zeros do not count towards the scale.
pub fn fits_column(value: Decimal, scale: u32, max: Decimal) -> bool {
    value.normalize().scale() <= scale && value.abs() < max
}

fn check_amount(value: Decimal) -> Result<(), ScheduleError> {
    if value < Decimal::ZERO || !fits_column(value, AMOUNT_SCALE, MAX_AMOUNT) {
        return Err(ScheduleError::InvalidAmount(value.to_string()));
    }
    Ok(())
}

/// `principal * rate_percent / 100`, rounded to cents.
pub fn monthly_interest(principal: Decimal, rate_percent: Decimal) -> Decimal {
    (principal * rate_percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    (28..=31)
        .rev()
        .find(|day| NaiveDate::from_ymd_opt(year, month, *day).is_some())
}

/// Advance `from` by `months` whole months and pin the day to `day`, clamped
/// to the last day of the target month.
pub fn add_months_clamped(from: NaiveDate, months: u32, day: u32) -> Option<NaiveDate> {
    let index = from.year() as i64 * 12 + from.month0() as i64 + months as i64;
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = index.rem_euclid(12) as u32 + 1;
    let last = days_in_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.min(last))
}

fn entries(
    anchor: NaiveDate,
    day: u32,
    first_sequence: i32,
    amount: Decimal,
    count: u32,
) -> Result<Vec<ScheduledPayment>, ScheduleError> {
    (1..=count)
        .map(|i| {
            let due_date =
                add_months_clamped(anchor, i, day).ok_or(ScheduleError::DateOverflow)?;
            Ok(ScheduledPayment {
                id: Uuid::new_v4(),
                sequence_number: first_sequence + i as i32 - 1,
                due_date,
                amount_due: amount,
                paid: false,
                paid_date: None,
                notes: None,
            })
        })
        .collect()
}

/// Build `count` monthly entries starting one month after `start`.
///
/// Each due date is computed from the original day of `start`, so a loan
/// issued on Jan 31 falls due on Feb 29 (leap year), Mar 31, Apr 30, ...
pub fn generate(
    start: NaiveDate,
    monthly_amount: Decimal,
    count: u32,
) -> Result<Vec<ScheduledPayment>, ScheduleError> {
    check_amount(monthly_amount)?;
    entries(start, start.day(), 1, monthly_amount, count)
}

impl Loan {
    fn entry_mut(&mut self, payment_id: Uuid) -> Result<&mut ScheduledPayment, ScheduleError> {
        self.schedule
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or(ScheduleError::PaymentNotFound(payment_id))
    }

    /// Sum of `amount_due` over entries not yet collected.
    pub fn remaining_balance(&self) -> Decimal {
        self.schedule
            .iter()
            .filter(|p| !p.paid)
            .map(|p| p.amount_due)
            .sum()
    }

    /// Flip to `Paid` once every entry is collected. Never flips back.
    fn refresh_status(&mut self) {
        if !self.schedule.is_empty() && self.schedule.iter().all(|p| p.paid) {
            self.status = LoanStatus::Paid;
        }
    }

    /// Append `count` entries after the last one.
    ///
    /// New due dates use the day of the first entry as clamp basis.
    pub fn append_months(&mut self, count: u32) -> Result<(), ScheduleError> {
        if count == 0 {
            return Err(ScheduleError::InvalidCount(count));
        }
        let first = self.schedule.first().ok_or(ScheduleError::EmptySchedule)?;
        let last = self.schedule.last().ok_or(ScheduleError::EmptySchedule)?;
        let day = first.due_date.day();
        let next_sequence = self
            .schedule
            .iter()
            .map(|p| p.sequence_number)
            .max()
            .unwrap_or(0)
            + 1;

        let more = entries(
            last.due_date,
            day,
            next_sequence,
            self.monthly_interest_amount,
            count,
        )?;
        self.schedule.extend(more);
        Ok(())
    }

    /// Mark one entry collected or pending.
    ///
    /// Marking the last pending entry closes the loan. Unmarking never
    /// reopens it; that is a manual status change.
    pub fn set_paid(
        &mut self,
        payment_id: Uuid,
        paid: bool,
        notes: Option<String>,
        today: NaiveDate,
    ) -> Result<(), ScheduleError> {
        let entry = self.entry_mut(payment_id)?;
        entry.paid = paid;
        entry.paid_date = paid.then_some(today);
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            entry.notes = Some(notes);
        }
        self.refresh_status();
        Ok(())
    }

    /// Change the amount owed for one entry, e.g. to add a late fee or to
    /// waive a month with zero.
    pub fn reprice(&mut self, payment_id: Uuid, amount: Decimal) -> Result<(), ScheduleError> {
        check_amount(amount)?;
        self.entry_mut(payment_id)?.amount_due = amount;
        Ok(())
    }

    /// Change principal and/or rate. Pending entries take the new monthly
    /// amount; collected entries keep what was actually charged.
    pub fn edit_terms(
        &mut self,
        principal: Option<Decimal>,
        rate_percent: Option<Decimal>,
    ) -> Result<(), ScheduleError> {
        let principal = principal.unwrap_or(self.principal);
        let rate_percent = rate_percent.unwrap_or(self.interest_rate_percent);
        if principal <= Decimal::ZERO {
            return Err(ScheduleError::InvalidAmount(principal.to_string()));
        }
        check_amount(principal)?;
        if rate_percent < Decimal::ZERO
            || !fits_column(rate_percent, RATE_SCALE, MAX_RATE_PERCENT)
        {
            return Err(ScheduleError::InvalidAmount(rate_percent.to_string()));
        }
        let amount = monthly_interest(principal, rate_percent);
        check_amount(amount)?;

        self.principal = principal;
        self.interest_rate_percent = rate_percent;
        self.monthly_interest_amount = amount;

        for entry in self.schedule.iter_mut().filter(|p| !p.paid) {
            entry.amount_due = amount;
        }
        Ok(())
    }

    /// Apply a collected `amount` to pending entries, oldest due date first.
    ///
    /// An entry is settled only when the remaining amount covers it in full;
    /// settling stops at the first entry that cannot be covered. Returns the
    /// settled entry ids and whatever was left unapplied.
    pub fn settle(
        &mut self,
        amount: Decimal,
        paid_on: NaiveDate,
    ) -> Result<(Vec<Uuid>, Decimal), ScheduleError> {
        if amount <= Decimal::ZERO {
            return Err(ScheduleError::InvalidAmount(amount.to_string()));
        }
        check_amount(amount)?;

        let mut pending: Vec<usize> = (0..self.schedule.len())
            .filter(|&i| !self.schedule[i].paid)
            .collect();
        pending.sort_by_key(|&i| (self.schedule[i].due_date, self.schedule[i].sequence_number));

        let mut left = amount;
        let mut settled = Vec::new();
        for i in pending {
            let entry = &mut self.schedule[i];
            if entry.amount_due > left {
                break;
            }
            left -= entry.amount_due;
            entry.paid = true;
            entry.paid_date = Some(paid_on);
            settled.push(entry.id);
        }

        self.refresh_status();
        Ok((settled, left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn loan_with(start: NaiveDate, principal: i64, rate: i64, months: u32) -> Loan {
        let monthly = monthly_interest(Decimal::from(principal), Decimal::from(rate));
        Loan {
            id: Uuid::new_v4(),
            client_name: "Juan Pérez".to_string(),
            phone: "5550001111".to_string(),
            address: "Av. Juárez 100".to_string(),
            id_photo: None,
            request_date: start,
            principal: Decimal::from(principal),
            interest_rate_percent: Decimal::from(rate),
            monthly_interest_amount: monthly,
            status: LoanStatus::Active,
            schedule: generate(start, monthly, months).unwrap(),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_monthly_interest() {
        assert_eq!(
            monthly_interest(Decimal::from(10_000), Decimal::from(20)),
            Decimal::from(2_000)
        );
        // 333.33 * 7.5% = 24.99975 -> 25.00
        assert_eq!(
            monthly_interest(Decimal::new(33333, 2), Decimal::new(75, 1)),
            Decimal::new(2500, 2)
        );
    }

    #[test]
    fn test_add_months_clamped_rolls_over_years() {
        assert_eq!(add_months_clamped(date(2024, 11, 15), 3, 15), Some(date(2025, 2, 15)));
        assert_eq!(add_months_clamped(date(2023, 12, 31), 2, 31), Some(date(2024, 2, 29)));
        assert_eq!(add_months_clamped(date(2025, 1, 30), 1, 30), Some(date(2025, 2, 28)));
        assert_eq!(add_months_clamped(date(2024, 3, 1), 24, 1), Some(date(2026, 3, 1)));
    }

    #[test]
    fn test_generate_clamps_from_original_day() {
        let schedule = generate(date(2024, 1, 31), Decimal::from(100), 3).unwrap();
        let dues: Vec<_> = schedule.iter().map(|p| p.due_date).collect();
        assert_eq!(dues, vec![date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30)]);
    }

    #[test]
    fn test_generate_shape() {
        let schedule = generate(date(2024, 5, 15), Decimal::from(250), 12).unwrap();
        assert_eq!(schedule.len(), 12);
        for (i, entry) in schedule.iter().enumerate() {
            assert_eq!(entry.sequence_number, i as i32 + 1);
            assert_eq!(entry.amount_due, Decimal::from(250));
            assert!(!entry.paid);
            assert!(entry.paid_date.is_none());
        }
        assert!(schedule.windows(2).all(|w| w[0].due_date < w[1].due_date));
        assert_eq!(schedule[11].due_date, date(2025, 5, 15));
    }

    #[test]
    fn test_generate_zero_entries() {
        assert!(generate(date(2024, 5, 15), Decimal::from(250), 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_append_months_continues_sequence() {
        let mut loan = loan_with(date(2024, 1, 15), 1000, 10, 12);
        loan.append_months(3).unwrap();
        assert_eq!(loan.schedule.len(), 15);
        let tail: Vec<_> = loan.schedule[12..]
            .iter()
            .map(|p| (p.sequence_number, p.due_date))
            .collect();
        assert_eq!(
            tail,
            vec![(13, date(2025, 2, 15)), (14, date(2025, 3, 15)), (15, date(2025, 4, 15))]
        );
    }

    #[test]
    fn test_append_months_uses_first_entry_day() {
        // Issued Dec 31: first entry Jan 31, last entry Apr 30.
        let mut loan = loan_with(date(2024, 12, 31), 1000, 10, 4);
        assert_eq!(loan.schedule[3].due_date, date(2025, 4, 30));
        loan.append_months(2).unwrap();
        assert_eq!(loan.schedule[4].due_date, date(2025, 5, 31));
        assert_eq!(loan.schedule[5].due_date, date(2025, 6, 30));
    }

    #[test]
    fn test_append_months_uses_current_monthly_amount() {
        let mut loan = loan_with(date(2024, 1, 10), 1000, 10, 2);
        loan.edit_terms(None, Some(Decimal::from(15))).unwrap();
        loan.append_months(1).unwrap();
        assert_eq!(loan.schedule[2].amount_due, Decimal::from(150));
    }

    #[test]
    fn test_append_months_rejects_bad_input() {
        let mut loan = loan_with(date(2024, 1, 10), 1000, 10, 2);
        assert_eq!(loan.append_months(0), Err(ScheduleError::InvalidCount(0)));
        loan.schedule.clear();
        assert_eq!(loan.append_months(1), Err(ScheduleError::EmptySchedule));
    }

    #[test]
    fn test_set_paid_roundtrip_touches_only_target() {
        let mut loan = loan_with(date(2024, 1, 10), 1000, 10, 3);
        let before = loan.schedule.clone();
        let target = loan.schedule[1].id;
        let today = date(2024, 3, 10);

        loan.set_paid(target, true, None, today).unwrap();
        assert!(loan.schedule[1].paid);
        assert_eq!(loan.schedule[1].paid_date, Some(today));

        loan.set_paid(target, false, None, today).unwrap();
        assert!(!loan.schedule[1].paid);
        assert_eq!(loan.schedule[1].paid_date, None);
        assert_eq!(loan.schedule, before);
    }

    #[test]
    fn test_set_paid_keeps_notes_unless_given() {
        let mut loan = loan_with(date(2024, 1, 10), 1000, 10, 2);
        let target = loan.schedule[0].id;
        let today = date(2024, 2, 10);

        loan.set_paid(target, true, Some("pagó en efectivo".to_string()), today)
            .unwrap();
        loan.set_paid(target, false, Some(String::new()), today).unwrap();
        assert_eq!(loan.schedule[0].notes.as_deref(), Some("pagó en efectivo"));
    }

    #[test]
    fn test_set_paid_unknown_entry() {
        let mut loan = loan_with(date(2024, 1, 10), 1000, 10, 2);
        let missing = Uuid::new_v4();
        assert_eq!(
            loan.set_paid(missing, true, None, date(2024, 2, 10)),
            Err(ScheduleError::PaymentNotFound(missing))
        );
    }

    #[test]
    fn test_last_payment_closes_loan_but_unmark_does_not_reopen() {
        let mut loan = loan_with(date(2024, 1, 10), 1000, 10, 2);
        let today = date(2024, 3, 10);
        let (first, last) = (loan.schedule[0].id, loan.schedule[1].id);

        loan.set_paid(first, true, None, today).unwrap();
        assert_eq!(loan.status, LoanStatus::Active);

        loan.set_paid(last, true, None, today).unwrap();
        assert_eq!(loan.status, LoanStatus::Paid);

        loan.set_paid(last, false, None, today).unwrap();
        assert_eq!(loan.status, LoanStatus::Paid);
    }

    #[test]
    fn test_reprice_leaves_paid_flag() {
        let mut loan = loan_with(date(2024, 1, 10), 1000, 10, 2);
        let target = loan.schedule[0].id;
        loan.set_paid(target, true, None, date(2024, 2, 10)).unwrap();
        loan.reprice(target, Decimal::from(180)).unwrap();
        assert_eq!(loan.schedule[0].amount_due, Decimal::from(180));
        assert!(loan.schedule[0].paid);

        let missing = Uuid::new_v4();
        assert_eq!(
            loan.reprice(missing, Decimal::from(1)),
            Err(ScheduleError::PaymentNotFound(missing))
        );
        assert!(loan.reprice(target, Decimal::new(-1, 0)).is_err());
    }

    #[test]
    fn test_reprice_to_zero_waives_a_month() {
        let mut loan = loan_with(date(2024, 1, 10), 1000, 10, 2);
        let target = loan.schedule[1].id;
        loan.reprice(target, Decimal::ZERO).unwrap();
        assert_eq!(loan.schedule[1].amount_due, Decimal::ZERO);
        assert_eq!(loan.remaining_balance(), Decimal::from(100));
    }

    #[test]
    fn test_reprice_rejects_values_the_column_cannot_hold() {
        let mut loan = loan_with(date(2024, 1, 10), 1000, 10, 2);
        let target = loan.schedule[0].id;
        assert!(loan.reprice(target, Decimal::new(12_345, 3)).is_err());
        assert!(loan.reprice(target, MAX_AMOUNT).is_err());
        loan.reprice(target, Decimal::new(12_340, 3)).unwrap();
        assert_eq!(loan.schedule[0].amount_due, Decimal::new(1234, 2));
    }

    #[test]
    fn test_column_limits() {
        assert_eq!(MAX_AMOUNT, Decimal::from(1_000_000_000_000_i64));
        assert!(fits_column(Decimal::new(99_999_999_999_999, 2), AMOUNT_SCALE, MAX_AMOUNT));
        assert!(!fits_column(Decimal::from(1_000_000_000_000_i64), AMOUNT_SCALE, MAX_AMOUNT));
        assert!(fits_column(Decimal::new(200_000, 4), RATE_SCALE, MAX_RATE_PERCENT));
        assert!(!fits_column(Decimal::new(2_000_005, 5), RATE_SCALE, MAX_RATE_PERCENT));
        assert!(!fits_column(Decimal::from(1000), RATE_SCALE, MAX_RATE_PERCENT));
    }

    #[test]
    fn test_edit_terms_rejects_rates_the_column_would_round() {
        let mut loan = loan_with(date(2024, 1, 10), 1_000_000, 20, 2);
        assert!(loan
            .edit_terms(None, Some(Decimal::new(2_000_005, 5)))
            .is_err());
        assert!(loan.edit_terms(None, Some(Decimal::from(1000))).is_err());
        assert_eq!(loan.interest_rate_percent, Decimal::from(20));
        assert_eq!(loan.monthly_interest_amount, Decimal::from(200_000));
    }

    #[test]
    fn test_generate_rejects_out_of_range_amount() {
        assert_eq!(
            generate(date(2024, 1, 10), MAX_AMOUNT, 1),
            Err(ScheduleError::InvalidAmount(MAX_AMOUNT.to_string()))
        );
    }

    #[test]
    fn test_edit_terms_reprices_only_pending() {
        let mut loan = loan_with(date(2024, 1, 10), 10_000, 20, 4);
        let today = date(2024, 3, 10);
        loan.set_paid(loan.schedule[0].id, true, None, today).unwrap();

        loan.edit_terms(None, Some(Decimal::from(10))).unwrap();

        assert_eq!(loan.monthly_interest_amount, Decimal::from(1_000));
        assert_eq!(loan.schedule[0].amount_due, Decimal::from(2_000));
        assert!(loan.schedule[1..]
            .iter()
            .all(|p| p.amount_due == Decimal::from(1_000)));
    }

    #[test]
    fn test_edit_terms_principal_only() {
        let mut loan = loan_with(date(2024, 1, 10), 10_000, 20, 2);
        loan.edit_terms(Some(Decimal::from(5_000)), None).unwrap();
        assert_eq!(loan.interest_rate_percent, Decimal::from(20));
        assert_eq!(loan.monthly_interest_amount, Decimal::from(1_000));
        assert!(loan.edit_terms(Some(Decimal::ZERO), None).is_err());
    }

    #[test]
    fn test_settle_oldest_first_and_keeps_leftover() {
        let mut loan = loan_with(date(2024, 1, 10), 1000, 10, 3);
        let paid_on = date(2024, 4, 1);

        let (settled, left) = loan.settle(Decimal::from(250), paid_on).unwrap();
        assert_eq!(settled, vec![loan.schedule[0].id, loan.schedule[1].id]);
        assert_eq!(left, Decimal::from(50));
        assert_eq!(loan.schedule[1].paid_date, Some(paid_on));
        assert!(!loan.schedule[2].paid);
        assert_eq!(loan.remaining_balance(), Decimal::from(100));
        assert_eq!(loan.status, LoanStatus::Active);

        let (settled, left) = loan.settle(Decimal::from(100), paid_on).unwrap();
        assert_eq!(settled.len(), 1);
        assert_eq!(left, Decimal::ZERO);
        assert_eq!(loan.status, LoanStatus::Paid);
        assert_eq!(loan.remaining_balance(), Decimal::ZERO);
    }

    #[test]
    fn test_settle_stops_at_first_uncovered_entry() {
        let mut loan = loan_with(date(2024, 1, 10), 1000, 10, 3);
        loan.reprice(loan.schedule[0].id, Decimal::from(300)).unwrap();
        let (settled, left) = loan.settle(Decimal::from(200), date(2024, 2, 10)).unwrap();
        assert!(settled.is_empty());
        assert_eq!(left, Decimal::from(200));
    }
}
