pub mod amortization;
pub mod applier;
pub mod matcher;
pub mod reamortize;

use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::loan::LoanRecord;
use crate::types::{InstallmentId, LoanId, LoanStatus, PaymentMethod};

pub use amortization::{add_months, level_payment, split_level_payment, PeriodSplit, ScheduleGenerator};
pub use applier::PaymentApplier;
pub use matcher::PaymentMatcher;
pub use reamortize::{ReamortizeAction, ReamortizeOutcome, Reamortizer};

/// incoming payment against a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub loan_id: LoanId,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

impl PaymentIntent {
    pub fn new(loan_id: LoanId, amount: Money, payment_method: PaymentMethod) -> Self {
        Self {
            loan_id,
            amount,
            payment_method,
            reference: None,
            notes: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// result of a successful payment application
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOutcome {
    /// the full updated loan and installment set to persist
    pub record: LoanRecord,
    /// installment the payment satisfied
    pub installment_id: InstallmentId,
    /// principal prepaid beyond the installment
    pub excess_principal: Money,
    /// part of the payment beyond the payoff amount, not applied
    pub unapplied_amount: Money,
    pub completed: bool,
    pub loan_status: LoanStatus,
    pub reamortization: Option<ReamortizeOutcome>,
}
