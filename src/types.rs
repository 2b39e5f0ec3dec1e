use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// unique identifier for a loan
pub type LoanId = Uuid;

/// unique identifier for a schedule entry
pub type InstallmentId = Uuid;

/// loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanStatus {
    /// schedule generated, awaiting approval
    Pending,
    /// approved, may already receive payments
    Approved,
    /// disbursed and performing
    Active,
    /// fully repaid
    Completed,
    /// written into default by an operator
    Defaulted,
    /// withdrawn before approval
    Cancelled,
}

impl LoanStatus {
    /// terminal states never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoanStatus::Completed | LoanStatus::Defaulted | LoanStatus::Cancelled
        )
    }
}

/// installment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstallmentStatus {
    Scheduled,
    Paid,
    Cancelled,
}

/// why an installment exists in the schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallmentKind {
    /// generated with the original schedule
    Regular,
    /// principal-only row recording excess paid with an installment
    Prepayment,
    /// single catch-up installment added once the term is exhausted
    Balloon,
}

/// how a payment was made
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    BankTransfer,
    Card,
    Cash,
    Cheque,
    Other(String),
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::BankTransfer => write!(f, "bank_transfer"),
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Cheque => write!(f, "cheque"),
            PaymentMethod::Other(name) => write!(f, "{}", name),
        }
    }
}

/// what to do with the part of a payment beyond the loan's remaining balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverpaymentPolicy {
    /// apply up to the balance and hand the rest back as unapplied
    CapAtBalance,
    /// reject the whole payment
    Reject,
}
