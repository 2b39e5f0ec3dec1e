use crate::errors::{LoanError, Result};
use crate::loan::{Installment, LoanRecord};

/// Selects the one installment a payment must satisfy.
///
/// Payments never target an installment directly: the earliest-due scheduled
/// row (ties broken by sequence) is always the next one.
pub struct PaymentMatcher;

impl PaymentMatcher {
    /// index of the next due installment, if any remain
    pub fn next_due_index(record: &LoanRecord) -> Option<usize> {
        record
            .installments
            .iter()
            .enumerate()
            .filter(|(_, i)| i.is_scheduled())
            .min_by_key(|(_, i)| (i.due_date, i.sequence))
            .map(|(idx, _)| idx)
    }

    pub fn next_due(record: &LoanRecord) -> Option<&Installment> {
        Self::next_due_index(record).map(|idx| &record.installments[idx])
    }

    /// next due installment or `NoScheduledPayments`
    pub fn match_next(record: &LoanRecord) -> Result<usize> {
        Self::next_due_index(record).ok_or(LoanError::NoScheduledPayments {
            loan_id: record.loan_id(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    use crate::decimal::{Money, Rate};
    use crate::loan::{Loan, LoanTerms};
    use crate::types::{InstallmentKind, PaymentMethod};

    fn record_with_dates(dates: &[(u32, u32)]) -> LoanRecord {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let terms = LoanTerms::new(Money::from_major(300), Rate::ZERO, dates.len() as u32, start);
        let loan = Loan::new(&terms, Money::from_major(100), Utc::now());
        let installments = dates
            .iter()
            .enumerate()
            .map(|(idx, (month, day))| {
                Installment::scheduled(
                    loan.id,
                    idx as u32 + 1,
                    NaiveDate::from_ymd_opt(2024, *month, *day).unwrap(),
                    Money::from_major(100),
                    Money::ZERO,
                    Money::ZERO,
                    InstallmentKind::Regular,
                )
            })
            .collect();
        LoanRecord::new(loan, installments)
    }

    #[test]
    fn test_picks_earliest_due_regardless_of_position() {
        let record = record_with_dates(&[(4, 1), (2, 1), (3, 1)]);
        let next = PaymentMatcher::next_due(&record).unwrap();
        assert_eq!(next.due_date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(PaymentMatcher::match_next(&record).unwrap(), 1);
    }

    #[test]
    fn test_ties_break_on_sequence() {
        let record = record_with_dates(&[(2, 1), (2, 1)]);
        assert_eq!(PaymentMatcher::next_due(&record).unwrap().sequence, 1);
    }

    #[test]
    fn test_skips_paid_and_cancelled() {
        let mut record = record_with_dates(&[(2, 1), (3, 1), (4, 1)]);
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        record.installments[0]
            .mark_paid(now, PaymentMethod::Cash, None, None)
            .unwrap();
        record.installments[1].cancel().unwrap();

        assert_eq!(PaymentMatcher::match_next(&record).unwrap(), 2);
    }

    #[test]
    fn test_nothing_left_to_collect() {
        let mut record = record_with_dates(&[(2, 1)]);
        record.installments[0].cancel().unwrap();
        let loan_id = record.loan_id();

        assert_eq!(
            PaymentMatcher::match_next(&record),
            Err(LoanError::NoScheduledPayments { loan_id })
        );

        let empty = LoanRecord::new(record.loan.clone(), Vec::new());
        assert!(PaymentMatcher::next_due(&empty).is_none());
    }
}
