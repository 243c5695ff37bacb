//! Sofin Backend Library
//!
//! Loan servicing for a small lender: loans with monthly interest schedules,
//! recorded collections, statistics and collection reminders.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod handlers;
pub mod loan;
pub mod middleware;
pub mod models;
pub mod reminder;
pub mod routes;
pub mod state;
