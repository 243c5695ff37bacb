//! Plain-text export of the monthly collection list, ready to paste into a
//! message or print.

use chrono::{Datelike, NaiveDate};

use super::stats::MonthlyGroup;
use crate::format::{format_currency, format_date, month_name};

pub fn monthly_collections_text(groups: &[MonthlyGroup], generated_on: NaiveDate) -> String {
    let mut text = format!("{}\nPRÉSTAMOS POR MES\n\n", format_date(generated_on));

    for group in groups {
        text.push_str(&format!("--- {} ---\n\n", group.label.to_uppercase()));

        for entry in &group.entries {
            let principal = entry.loan.principal;
            let interest = entry.payment.amount_due;
            let due = entry.payment.due_date;
            text.push_str(&format!(
                "-{}, cobrar {} + {} de interés. Total {} para {:02} de {} de {}.\n\n",
                entry.loan.client_name,
                format_currency(principal),
                format_currency(interest),
                format_currency(principal + interest),
                due.day(),
                month_name(due.month()).to_lowercase(),
                due.year()
            ));
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::{LoanRef, DuePayment, ScheduledPayment};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[test]
    fn test_monthly_text_layout() {
        let due = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let groups = vec![MonthlyGroup {
            key: "2024-03".to_string(),
            year: 2024,
            month: 3,
            label: "Marzo 2024".to_string(),
            entries: vec![DuePayment {
                loan: LoanRef {
                    id: Uuid::new_v4(),
                    client_name: "Ana Ruiz".to_string(),
                    phone: "5550001111".to_string(),
                    address: "Centro".to_string(),
                    principal: Decimal::from(10_000),
                },
                payment: ScheduledPayment {
                    id: Uuid::new_v4(),
                    sequence_number: 2,
                    due_date: due,
                    amount_due: Decimal::from(2_000),
                    paid: false,
                    paid_date: None,
                    notes: None,
                },
            }],
        }];

        let generated_on = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        let text = monthly_collections_text(&groups, generated_on);
        assert_eq!(
            text,
            "28 de febrero de 2024\nPRÉSTAMOS POR MES\n\n\
             --- MARZO 2024 ---\n\n\
             -Ana Ruiz, cobrar $10,000.00 + $2,000.00 de interés. Total $12,000.00 para 05 de marzo de 2024.\n\n"
        );
    }

    #[test]
    fn test_monthly_text_without_groups() {
        let generated_on = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        assert_eq!(
            monthly_collections_text(&[], generated_on),
            "28 de febrero de 2024\nPRÉSTAMOS POR MES\n\n"
        );
    }
}
