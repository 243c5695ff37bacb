//! Schedule, statistics and export behaviour over in-memory loans

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use sofin_server::loan::{
        due_pending_as_of, generate, monthly_collections, monthly_collections_text,
        monthly_interest, Loan, LoanStatistics, LoanStatus, MonthlyFilter,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn loan(name: &str, request_date: NaiveDate, principal: i64, rate: i64) -> Loan {
        let principal = Decimal::from(principal);
        let monthly = monthly_interest(principal, Decimal::from(rate));
        Loan {
            id: Uuid::new_v4(),
            client_name: name.to_string(),
            phone: "5551234567".to_string(),
            address: "Calle 1".to_string(),
            id_photo: None,
            request_date,
            principal,
            interest_rate_percent: Decimal::from(rate),
            monthly_interest_amount: monthly,
            status: LoanStatus::Active,
            schedule: generate(request_date, monthly, 12).unwrap(),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_month_end_loan_lifecycle() {
        let mut loan = loan("Ana", date(2024, 1, 31), 10_000, 20);
        assert_eq!(loan.monthly_interest_amount, Decimal::from(2_000));
        assert_eq!(loan.schedule[0].due_date, date(2024, 2, 29));
        assert_eq!(loan.schedule[11].due_date, date(2025, 1, 31));

        loan.append_months(2).unwrap();
        assert_eq!(loan.schedule.len(), 14);
        assert_eq!(loan.schedule[12].due_date, date(2025, 2, 28));
        assert_eq!(loan.schedule[13].sequence_number, 14);

        let ids: Vec<Uuid> = loan.schedule.iter().map(|p| p.id).collect();
        for id in &ids {
            loan.set_paid(*id, true, None, date(2024, 6, 1)).unwrap();
        }
        assert_eq!(loan.status, LoanStatus::Paid);
        assert_eq!(loan.remaining_balance(), Decimal::ZERO);

        loan.set_paid(ids[0], false, None, date(2024, 6, 2)).unwrap();
        assert_eq!(loan.status, LoanStatus::Paid);
        assert_eq!(loan.remaining_balance(), Decimal::from(2_000));
    }

    #[test]
    fn test_views_skip_paid_loans() {
        let today = date(2024, 3, 10);
        let active = loan("Ana", date(2024, 1, 5), 10_000, 20);
        let mut closed = loan("Beto", date(2024, 1, 5), 5_000, 10);
        closed.status = LoanStatus::Paid;
        let loans = vec![active, closed];

        let due = due_pending_as_of(&loans, today);
        assert_eq!(due.len(), 2);
        assert!(due.iter().all(|d| d.loan.client_name == "Ana"));

        let stats = LoanStatistics::compute(&loans, today);
        assert_eq!(stats.active_count, 1);
        assert_eq!(stats.paid_count, 1);
        assert_eq!(stats.total_principal_active, Decimal::from(10_000));
        assert_eq!(stats.total_monthly_interest_active, Decimal::from(2_000));

        let filter = MonthlyFilter {
            year: Some(2024),
            month: Some(3),
        };
        let groups = monthly_collections(&loans, &filter);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, "2024-03");

        let text = monthly_collections_text(&groups, today);
        assert!(text.starts_with("10 de marzo de 2024\nPRÉSTAMOS POR MES\n\n--- MARZO 2024 ---"));
        assert!(text.contains("-Ana, cobrar $10,000.00 + $2,000.00 de interés."));
        assert!(!text.contains("Beto"));
    }

    #[test]
    fn test_settle_covers_oldest_first() {
        let mut loan = loan("Ana", date(2024, 1, 15), 1_000, 10);
        let (settled, leftover) = loan
            .settle(Decimal::new(25_000, 2), date(2024, 3, 20))
            .unwrap();

        assert_eq!(settled, vec![loan.schedule[0].id, loan.schedule[1].id]);
        assert_eq!(leftover, Decimal::from(50));
        assert!(loan.schedule[..2].iter().all(|p| p.paid));
        assert!(!loan.schedule[2].paid);
        assert_eq!(loan.schedule[0].paid_date, Some(date(2024, 3, 20)));
    }
}
