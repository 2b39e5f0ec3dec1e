use hourglass_rs::SafeTimeProvider;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::events::{AuditEmitter, EventStore};
use crate::lifecycle::LoanLifecycle;
use crate::loan::{Installment, Loan, LoanRecord, LoanTerms};
use crate::payments::{
    PaymentApplier, PaymentIntent, PaymentOutcome, ReamortizeOutcome, Reamortizer,
    ScheduleGenerator,
};
use crate::repository::LoanRepository;
use crate::serialization::LoanView;
use crate::types::{LoanId, LoanStatus};

/// Host-facing facade over the engine.
///
/// Every mutation runs inside the repository's per-loan transaction; audit
/// events are recorded before commit so a failed audit write leaves the loan
/// untouched.
pub struct LoanServicer<R, A> {
    repository: R,
    audit: A,
    config: EngineConfig,
}

impl<R: LoanRepository, A: AuditEmitter> LoanServicer<R, A> {
    pub fn new(repository: R, audit: A, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            repository,
            audit,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn audit(&self) -> &A {
        &self.audit
    }

    /// generate the schedule for new terms and store the pending loan
    pub fn originate(&self, terms: &LoanTerms, time_provider: &SafeTimeProvider) -> Result<LoanRecord> {
        let mut events = EventStore::new();
        let record = ScheduleGenerator::new(&self.config).generate(terms, time_provider, &mut events)?;

        self.record_events(&mut events)?;
        self.repository.insert(record.clone())?;

        Ok(record)
    }

    pub fn approve(&self, loan_id: LoanId, time_provider: &SafeTimeProvider) -> Result<Loan> {
        self.change_status(loan_id, LoanStatus::Approved, "approved", time_provider)
    }

    pub fn activate(&self, loan_id: LoanId, time_provider: &SafeTimeProvider) -> Result<Loan> {
        self.change_status(loan_id, LoanStatus::Active, "funds disbursed", time_provider)
    }

    pub fn cancel(&self, loan_id: LoanId, reason: &str, time_provider: &SafeTimeProvider) -> Result<Loan> {
        self.change_status(loan_id, LoanStatus::Cancelled, reason, time_provider)
    }

    pub fn mark_defaulted(
        &self,
        loan_id: LoanId,
        reason: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<Loan> {
        self.change_status(loan_id, LoanStatus::Defaulted, reason, time_provider)
    }

    /// apply one payment; rejected payments change nothing and emit nothing
    pub fn apply_payment(
        &self,
        intent: &PaymentIntent,
        time_provider: &SafeTimeProvider,
    ) -> Result<PaymentOutcome> {
        let applier = PaymentApplier::new(&self.config);

        let result = self.repository.transact(intent.loan_id, |record| {
            let mut events = EventStore::new();
            let outcome = applier.apply(record, intent, time_provider, &mut events)?;
            self.record_events(&mut events)?;
            *record = outcome.record.clone();
            Ok(outcome)
        });

        if let Err(err) = &result {
            warn!(loan_id = %intent.loan_id, amount = %intent.amount, error = %err, "payment rejected");
        }
        result
    }

    /// administrative recast of the remaining schedule against the current balance
    pub fn recast(&self, loan_id: LoanId, time_provider: &SafeTimeProvider) -> Result<ReamortizeOutcome> {
        let reamortizer = Reamortizer::new(&self.config);

        self.repository.transact(loan_id, |record| {
            LoanLifecycle::ensure_accepts_payments(&record.loan)?;

            let mut events = EventStore::new();
            let outcome = reamortizer.reamortize(
                record,
                Money::ZERO,
                time_provider.now(),
                &mut events,
            )?;
            self.record_events(&mut events)?;

            info!(loan_id = %loan_id, action = ?outcome.action, "administrative recast");
            Ok(outcome)
        })
    }

    pub fn load(&self, loan_id: LoanId) -> Result<LoanRecord> {
        self.repository.load(loan_id)
    }

    /// installments ordered by due date
    pub fn schedule(&self, loan_id: LoanId) -> Result<Vec<Installment>> {
        let mut installments = self.repository.load(loan_id)?.installments;
        installments.sort_by_key(|i| (i.due_date, i.sequence));
        Ok(installments)
    }

    pub fn view(&self, loan_id: LoanId) -> Result<LoanView> {
        Ok(LoanView::from_record(&self.repository.load(loan_id)?))
    }

    fn change_status(
        &self,
        loan_id: LoanId,
        to: LoanStatus,
        reason: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<Loan> {
        self.repository.transact(loan_id, |record| {
            let mut events = EventStore::new();
            LoanLifecycle::transition(&mut record.loan, to, reason, time_provider.now(), &mut events)?;
            self.record_events(&mut events)?;
            Ok(record.loan.clone())
        })
    }

    fn record_events(&self, events: &mut EventStore) -> Result<()> {
        for event in events.take_events() {
            self.audit.record_event(&event).map_err(|e| LoanError::Repository {
                message: format!("audit write failed for {}: {}", event.kind(), e),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use hourglass_rs::TimeSource;
    use std::thread;

    use crate::decimal::Rate;
    use crate::events::InMemoryAuditLog;
    use crate::repository::InMemoryLoanRepository;
    use crate::types::{InstallmentStatus, PaymentMethod};

    type Servicer = LoanServicer<InMemoryLoanRepository, InMemoryAuditLog>;

    fn servicer() -> Servicer {
        LoanServicer::new(
            InMemoryLoanRepository::new(),
            InMemoryAuditLog::new(),
            EngineConfig::default(),
        )
        .unwrap()
    }

    fn time() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
        ))
    }

    fn money(s: &str) -> Money {
        Money::from_str_exact(s).unwrap()
    }

    fn reference_terms() -> LoanTerms {
        LoanTerms::new(
            Money::from_major(100_000),
            Rate::from_percentage(6),
            12,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        )
    }

    fn active_loan(servicer: &Servicer, terms: &LoanTerms, time: &SafeTimeProvider) -> LoanId {
        let loan_id = servicer.originate(terms, time).unwrap().loan_id();
        servicer.approve(loan_id, time).unwrap();
        servicer.activate(loan_id, time).unwrap();
        loan_id
    }

    #[test]
    fn test_full_servicing_flow() {
        let servicer = servicer();
        let time = time();
        let control = time.test_control().unwrap();
        let loan_id = active_loan(&servicer, &reference_terms(), &time);

        control.advance(Duration::days(31));
        let intent = PaymentIntent::new(loan_id, money("18606.64"), PaymentMethod::BankTransfer)
            .with_reference("wire-1")
            .with_notes("first payment with extra");
        let outcome = servicer.apply_payment(&intent, &time).unwrap();
        assert_eq!(outcome.excess_principal, Money::from_major(10_000));

        let stored = servicer.load(loan_id).unwrap();
        assert_eq!(stored, outcome.record);
        assert_eq!(stored.outstanding_balance(), money("81893.36"));
        assert!(stored.loan.current_monthly_payment < money("8606.64"));
        assert!(stored.check_invariants().is_ok());

        let paid = stored.installment(outcome.installment_id).unwrap();
        assert_eq!(paid.paid_at, Some(time.now()));
        assert_eq!(paid.notes.as_deref(), Some("first payment with extra"));

        let processed = servicer.audit().records_of_kind("PAYMENT_PROCESSED");
        assert_eq!(processed.len(), 1);
        assert_eq!(processed[0].resource_id, loan_id);
        assert_eq!(processed[0].payload["extra_principal_applied"], "10000.00");
        assert_eq!(processed[0].payload["reference"], "wire-1");
        assert_eq!(servicer.audit().records_of_kind("LOAN_REAMORTIZED").len(), 1);
    }

    #[test]
    fn test_rejected_payment_leaves_store_and_audit_untouched() {
        let servicer = servicer();
        let time = time();
        let loan_id = active_loan(&servicer, &reference_terms(), &time);
        let before = servicer.load(loan_id).unwrap();
        let audit_before = servicer.audit().records().len();

        let intent = PaymentIntent::new(loan_id, money("8606.63"), PaymentMethod::Card);
        let err = servicer.apply_payment(&intent, &time).unwrap_err();

        assert!(matches!(err, LoanError::InsufficientPayment { .. }));
        assert_eq!(servicer.load(loan_id).unwrap(), before);
        assert_eq!(servicer.audit().records().len(), audit_before);
    }

    #[test]
    fn test_pending_loan_rejects_payment() {
        let servicer = servicer();
        let time = time();
        let loan_id = servicer.originate(&reference_terms(), &time).unwrap().loan_id();

        let intent = PaymentIntent::new(loan_id, money("8606.64"), PaymentMethod::Card);
        assert_eq!(
            servicer.apply_payment(&intent, &time).unwrap_err(),
            LoanError::InvalidLoanStatus { status: LoanStatus::Pending }
        );

        let cancelled = servicer.cancel(loan_id, "borrower withdrew", &time).unwrap();
        assert_eq!(cancelled.status, LoanStatus::Cancelled);
        assert!(servicer.approve(loan_id, &time).is_err());
    }

    #[test]
    fn test_invalid_terms_store_nothing() {
        let servicer = servicer();
        let terms = LoanTerms {
            term_months: 0,
            ..reference_terms()
        };
        assert!(matches!(
            servicer.originate(&terms, &time()),
            Err(LoanError::InvalidLoanTerms { .. })
        ));
        assert!(servicer.repository().is_empty());
        assert!(servicer.audit().records().is_empty());
    }

    #[test]
    fn test_payoff_then_no_more_payments() {
        let servicer = servicer();
        let time = time();
        let loan_id = active_loan(&servicer, &reference_terms(), &time);

        let payoff = PaymentIntent::new(loan_id, Money::from_major(100_500), PaymentMethod::BankTransfer);
        let outcome = servicer.apply_payment(&payoff, &time).unwrap();
        assert!(outcome.completed);

        let view = servicer.view(loan_id).unwrap();
        assert_eq!(view.status, LoanStatus::Completed);
        assert_eq!(view.outstanding_balance, Money::ZERO);
        assert_eq!(view.cancelled_installments, 11);

        let again = PaymentIntent::new(loan_id, Money::from_major(1), PaymentMethod::BankTransfer);
        assert!(matches!(
            servicer.apply_payment(&again, &time),
            Err(LoanError::InvalidLoanStatus { status: LoanStatus::Completed })
        ));
        assert!(servicer.mark_defaulted(loan_id, "late", &time).is_err());
    }

    #[test]
    fn test_administrative_recast_is_stable() {
        let servicer = servicer();
        let time = time();
        let loan_id = active_loan(&servicer, &reference_terms(), &time);
        let before = servicer.load(loan_id).unwrap();

        let outcome = servicer.recast(loan_id, &time).unwrap();
        assert_eq!(outcome.outstanding_balance, Money::from_major(100_000));

        // recasting an untouched schedule reproduces it
        let after = servicer.load(loan_id).unwrap();
        assert_eq!(after.loan.current_monthly_payment, before.loan.current_monthly_payment);
        for (a, b) in after.installments.iter().zip(before.installments.iter()) {
            assert_eq!(a.amount_due, b.amount_due);
            assert_eq!(a.principal_portion, b.principal_portion);
        }
    }

    #[test]
    fn test_concurrent_payments_never_double_apply() {
        let servicer = servicer();
        let time = time();
        let terms = LoanTerms::new(
            Money::from_major(12_000),
            Rate::ZERO,
            12,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        );
        let loan_id = active_loan(&servicer, &terms, &time);

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let time = SafeTimeProvider::new(TimeSource::Test(
                        Utc.with_ymd_and_hms(2024, 2, 15, 9, 0, 0).unwrap(),
                    ));
                    for _ in 0..3 {
                        let intent =
                            PaymentIntent::new(loan_id, Money::from_major(1_000), PaymentMethod::Card);
                        servicer.apply_payment(&intent, &time).unwrap();
                    }
                });
            }
        });

        let record = servicer.load(loan_id).unwrap();
        assert_eq!(record.loan.status, LoanStatus::Completed);
        assert!(record
            .installments
            .iter()
            .all(|i| i.status == InstallmentStatus::Paid));
        assert_eq!(record.paid_principal(), Money::from_major(12_000));
        assert_eq!(servicer.audit().records_of_kind("PAYMENT_PROCESSED").len(), 12);
    }
}
