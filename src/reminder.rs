//! Collection reminders
//!
//! The reminder preference is loaded once with the rest of the configuration
//! and handed to whoever renders reminders.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use crate::format::{format_currency, format_short_date};
use crate::loan::DuePayment;

const TIME_FORMAT: &str = "%H:%M";

fn serialize_time<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.format(TIME_FORMAT).to_string())
}

/// Time of day to remind about pending collections, and whether to do it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReminderConfig {
    #[serde(serialize_with = "serialize_time")]
    pub time: NaiveTime,
    pub enabled: bool,
}

impl ReminderConfig {
    /// Parse a strict `HH:MM` time.
    pub fn parse(time: &str, enabled: bool) -> Result<Self, chrono::ParseError> {
        let time = NaiveTime::parse_from_str(time.trim(), TIME_FORMAT)?;
        Ok(Self { time, enabled })
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            enabled: false,
        }
    }
}

/// What a reminder would say right now.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderDigest {
    pub config: ReminderConfig,
    pub as_of: NaiveDate,
    pub notify: bool,
    pub total_due: Decimal,
    pub message: String,
    pub items: Vec<DuePayment>,
}

impl ReminderDigest {
    pub fn build(config: ReminderConfig, as_of: NaiveDate, items: Vec<DuePayment>) -> Self {
        let total_due = items.iter().map(|i| i.payment.amount_due).sum();
        let message = notification_text(&items);
        Self {
            config,
            as_of,
            notify: config.enabled && !items.is_empty(),
            total_due,
            message,
            items,
        }
    }
}

/// One-line notification body for the due set.
pub fn notification_text(items: &[DuePayment]) -> String {
    if items.is_empty() {
        return "Sin cobros pendientes".to_string();
    }

    let noun = if items.len() == 1 {
        "cobro pendiente"
    } else {
        "cobros pendientes"
    };
    let details: Vec<String> = items
        .iter()
        .map(|item| {
            format!(
                "{} {} ({})",
                item.loan.client_name,
                format_currency(item.payment.amount_due),
                format_short_date(item.payment.due_date)
            )
        })
        .collect();

    format!("{} {}: {}", items.len(), noun, details.join("; "))
}
