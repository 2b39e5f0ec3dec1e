use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::types::{
    InstallmentId, InstallmentKind, InstallmentStatus, LoanId, LoanStatus, PaymentMethod,
};

/// terms a loan is originated with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub principal: Money,
    pub annual_rate: Rate,
    pub term_months: u32,
    pub start_date: NaiveDate,
    /// flat fee added to every regular installment
    pub fee_per_installment: Money,
}

impl LoanTerms {
    pub fn new(principal: Money, annual_rate: Rate, term_months: u32, start_date: NaiveDate) -> Self {
        Self {
            principal,
            annual_rate,
            term_months,
            start_date,
            fee_per_installment: Money::ZERO,
        }
    }

    pub fn with_fee(mut self, fee_per_installment: Money) -> Self {
        self.fee_per_installment = fee_per_installment;
        self
    }

    /// reject terms no schedule can be built from
    pub fn validate(&self, config: &EngineConfig) -> Result<()> {
        if !self.principal.is_positive() {
            return Err(LoanError::InvalidLoanTerms {
                message: format!("principal must be positive, got {}", self.principal),
            });
        }

        if self.term_months < 1 {
            return Err(LoanError::InvalidLoanTerms {
                message: "term must be at least one month".to_string(),
            });
        }

        let rate_percent = self.annual_rate.as_percentage();
        if rate_percent < Decimal::ZERO || rate_percent > config.max_annual_rate_percent {
            return Err(LoanError::InvalidLoanTerms {
                message: format!(
                    "annual rate {} outside 0..={}%",
                    self.annual_rate, config.max_annual_rate_percent
                ),
            });
        }

        if self.fee_per_installment.is_negative() {
            return Err(LoanError::InvalidLoanTerms {
                message: format!("fee must not be negative, got {}", self.fee_per_installment),
            });
        }

        // every installment must carry at least one cent of principal
        if self.principal.minor_units() < i64::from(self.term_months) {
            return Err(LoanError::InvalidLoanTerms {
                message: format!(
                    "principal {} too small to spread over {} installments",
                    self.principal, self.term_months
                ),
            });
        }

        Ok(())
    }
}

/// a borrowing agreement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub principal: Money,
    pub annual_rate: Rate,
    /// original number of installments
    pub term_months: u32,
    pub start_date: NaiveDate,
    pub fee_per_installment: Money,
    /// current standard installment, changed only by re-amortization
    pub current_monthly_payment: Money,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub status_changed_at: DateTime<Utc>,
}

impl Loan {
    pub fn new(terms: &LoanTerms, monthly_payment: Money, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            principal: terms.principal,
            annual_rate: terms.annual_rate,
            term_months: terms.term_months,
            start_date: terms.start_date,
            fee_per_installment: terms.fee_per_installment,
            current_monthly_payment: monthly_payment,
            status: LoanStatus::Pending,
            created_at: now,
            status_changed_at: now,
        }
    }

    pub fn monthly_rate(&self) -> Rate {
        self.annual_rate.monthly_rate()
    }

    pub fn terms(&self) -> LoanTerms {
        LoanTerms {
            principal: self.principal,
            annual_rate: self.annual_rate,
            term_months: self.term_months,
            start_date: self.start_date,
            fee_per_installment: self.fee_per_installment,
        }
    }
}

/// one obligation within a loan's schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub loan_id: LoanId,
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub amount_due: Money,
    pub principal_portion: Money,
    pub interest_portion: Money,
    pub fees_portion: Money,
    pub status: InstallmentStatus,
    pub kind: InstallmentKind,
    pub paid_amount: Option<Money>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<PaymentMethod>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

impl Installment {
    /// new scheduled installment; amount due is derived from its portions
    pub fn scheduled(
        loan_id: LoanId,
        sequence: u32,
        due_date: NaiveDate,
        principal_portion: Money,
        interest_portion: Money,
        fees_portion: Money,
        kind: InstallmentKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_id,
            sequence,
            due_date,
            amount_due: principal_portion + interest_portion + fees_portion,
            principal_portion,
            interest_portion,
            fees_portion,
            status: InstallmentStatus::Scheduled,
            kind,
            paid_amount: None,
            paid_at: None,
            payment_method: None,
            reference: None,
            notes: None,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.status == InstallmentStatus::Scheduled
    }

    pub fn is_paid(&self) -> bool {
        self.status == InstallmentStatus::Paid
    }

    /// rewrite the split of a scheduled installment
    pub fn set_portions(&mut self, principal_portion: Money, interest_portion: Money) {
        self.principal_portion = principal_portion;
        self.interest_portion = interest_portion;
        self.amount_due = principal_portion + interest_portion + self.fees_portion;
    }

    /// Scheduled -> Paid, recording the settled amount
    pub fn mark_paid(
        &mut self,
        paid_at: DateTime<Utc>,
        payment_method: PaymentMethod,
        reference: Option<String>,
        notes: Option<String>,
    ) -> Result<()> {
        self.ensure_scheduled()?;
        self.status = InstallmentStatus::Paid;
        self.paid_amount = Some(self.amount_due);
        self.paid_at = Some(paid_at);
        self.payment_method = Some(payment_method);
        self.reference = reference;
        self.notes = notes;
        Ok(())
    }

    /// Scheduled -> Cancelled
    pub fn cancel(&mut self) -> Result<()> {
        self.ensure_scheduled()?;
        self.status = InstallmentStatus::Cancelled;
        Ok(())
    }

    /// amount due equals the sum of its portions
    pub fn is_balanced(&self) -> bool {
        self.amount_due == self.principal_portion + self.interest_portion + self.fees_portion
    }

    fn ensure_scheduled(&self) -> Result<()> {
        if !self.is_scheduled() {
            return Err(LoanError::InstallmentNotScheduled {
                installment_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }
}

/// a loan together with its full installment set, the unit hosts load and store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub loan: Loan,
    pub installments: Vec<Installment>,
}

impl LoanRecord {
    pub fn new(loan: Loan, installments: Vec<Installment>) -> Self {
        Self { loan, installments }
    }

    pub fn loan_id(&self) -> LoanId {
        self.loan.id
    }

    /// principal settled by paid installments
    pub fn paid_principal(&self) -> Money {
        self.installments
            .iter()
            .filter(|i| i.is_paid())
            .map(|i| i.principal_portion)
            .sum()
    }

    pub fn interest_paid(&self) -> Money {
        self.installments
            .iter()
            .filter(|i| i.is_paid())
            .map(|i| i.interest_portion)
            .sum()
    }

    pub fn outstanding_balance(&self) -> Money {
        self.loan.principal - self.paid_principal()
    }

    /// scheduled installments, earliest due first
    pub fn scheduled(&self) -> Vec<&Installment> {
        let mut scheduled: Vec<&Installment> =
            self.installments.iter().filter(|i| i.is_scheduled()).collect();
        scheduled.sort_by_key(|i| (i.due_date, i.sequence));
        scheduled
    }

    /// indices of scheduled installments, earliest due first
    pub fn scheduled_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .installments
            .iter()
            .enumerate()
            .filter(|(_, i)| i.is_scheduled())
            .map(|(idx, _)| idx)
            .collect();
        indices.sort_by_key(|&idx| (self.installments[idx].due_date, self.installments[idx].sequence));
        indices
    }

    pub fn next_sequence(&self) -> u32 {
        self.installments
            .iter()
            .map(|i| i.sequence)
            .max()
            .map_or(1, |s| s + 1)
    }

    pub fn last_due_date(&self) -> Option<NaiveDate> {
        self.installments.iter().map(|i| i.due_date).max()
    }

    pub fn installment(&self, id: InstallmentId) -> Option<&Installment> {
        self.installments.iter().find(|i| i.id == id)
    }

    /// balance conservation and per-row sums
    pub fn check_invariants(&self) -> Result<()> {
        if let Some(bad) = self.installments.iter().find(|i| !i.is_balanced()) {
            return Err(LoanError::CalculationError {
                message: format!(
                    "installment {} due {} does not equal its portions",
                    bad.sequence, bad.amount_due
                ),
            });
        }

        let scheduled_principal: Money = self
            .installments
            .iter()
            .filter(|i| i.is_scheduled())
            .map(|i| i.principal_portion)
            .sum();
        if !self.loan.status.is_terminal()
            && !self.scheduled().is_empty()
            && scheduled_principal != self.outstanding_balance()
        {
            return Err(LoanError::CalculationError {
                message: format!(
                    "scheduled principal {} diverges from outstanding balance {}",
                    scheduled_principal,
                    self.outstanding_balance()
                ),
            });
        }

        if self.outstanding_balance().is_negative() {
            return Err(LoanError::CalculationError {
                message: format!("outstanding balance {} is negative", self.outstanding_balance()),
            });
        }

        Ok(())
    }
}
