//! Loans, their monthly interest schedules and recorded collections

pub mod export;
pub mod model;
pub mod schedule;
pub mod service;
pub mod stats;

pub use export::monthly_collections_text;
pub use model::*;
pub use schedule::{
    add_months_clamped, generate, monthly_interest, ScheduleError, DEFAULT_SCHEDULE_MONTHS,
};
pub use service::{LoanDetail, LoanService};
pub use stats::{
    due_pending_as_of, monthly_collections, DuePayment, LoanRef, LoanStatistics, LoanSummary,
    MonthlyFilter, MonthlyGroup,
};
