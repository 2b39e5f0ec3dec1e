/// serialization support for loans
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::loan::LoanRecord;
use crate::payments::PaymentMatcher;
use crate::types::{InstallmentStatus, LoanId, LoanStatus};

/// serializable summary of a loan and its schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanView {
    pub id: LoanId,
    pub status: LoanStatus,
    pub principal: Money,
    pub annual_rate: Rate,
    pub term_months: u32,
    pub current_monthly_payment: Money,
    pub outstanding_balance: Money,
    pub principal_paid: Money,
    pub interest_paid: Money,
    pub paid_installments: u32,
    pub scheduled_installments: u32,
    pub cancelled_installments: u32,
    pub next_payment: Option<NextPaymentView>,
    pub last_status_change: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextPaymentView {
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub amount_due: Money,
    pub principal_portion: Money,
    pub interest_portion: Money,
}

impl LoanView {
    pub fn from_record(record: &LoanRecord) -> Self {
        let count = |status: InstallmentStatus| {
            record
                .installments
                .iter()
                .filter(|i| i.status == status)
                .count() as u32
        };

        LoanView {
            id: record.loan.id,
            status: record.loan.status,
            principal: record.loan.principal,
            annual_rate: record.loan.annual_rate,
            term_months: record.loan.term_months,
            current_monthly_payment: record.loan.current_monthly_payment,
            outstanding_balance: record.outstanding_balance(),
            principal_paid: record.paid_principal(),
            interest_paid: record.interest_paid(),
            paid_installments: count(InstallmentStatus::Paid),
            scheduled_installments: count(InstallmentStatus::Scheduled),
            cancelled_installments: count(InstallmentStatus::Cancelled),
            next_payment: PaymentMatcher::next_due(record).map(|i| NextPaymentView {
                sequence: i.sequence,
                due_date: i.due_date,
                amount_due: i.amount_due,
                principal_portion: i.principal_portion,
                interest_portion: i.interest_portion,
            }),
            last_status_change: record.loan.status_changed_at,
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hourglass_rs::{SafeTimeProvider, TimeSource};

    use crate::config::EngineConfig;
    use crate::events::EventStore;
    use crate::loan::LoanTerms;
    use crate::payments::ScheduleGenerator;

    #[test]
    fn test_view_of_fresh_loan() {
        let config = EngineConfig::default();
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
        ));
        let terms = LoanTerms::new(
            Money::from_major(100_000),
            Rate::from_percentage(6),
            12,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        );
        let record = ScheduleGenerator::new(&config)
            .generate(&terms, &time, &mut EventStore::new())
            .unwrap();

        let view = LoanView::from_record(&record);
        assert_eq!(view.status, LoanStatus::Pending);
        assert_eq!(view.outstanding_balance, Money::from_major(100_000));
        assert_eq!(view.scheduled_installments, 12);
        assert_eq!(view.paid_installments, 0);

        let next = view.next_payment.as_ref().unwrap();
        assert_eq!(next.sequence, 1);
        assert_eq!(next.interest_portion, Money::from_major(500));

        let json = view.to_json_pretty().unwrap();
        assert!(json.contains("\"current_monthly_payment\": \"8606.64\""));
        let back: LoanView = serde_json::from_str(&json).unwrap();
        assert_eq!(back, view);
    }
}
