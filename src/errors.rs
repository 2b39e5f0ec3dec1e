use thiserror::Error;

use crate::decimal::Money;
use crate::types::{InstallmentId, InstallmentStatus, LoanId, LoanStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoanError {
    #[error("loan cannot accept payments: current status is {status:?}")]
    InvalidLoanStatus {
        status: LoanStatus,
    },

    #[error("no scheduled payments remain for loan {loan_id}")]
    NoScheduledPayments {
        loan_id: LoanId,
    },

    #[error("insufficient payment: amount due {amount_due}, provided {provided}, shortfall {shortfall}")]
    InsufficientPayment {
        amount_due: Money,
        provided: Money,
        shortfall: Money,
    },

    #[error("payment of {provided} exceeds total payoff amount {payoff}")]
    PaymentExceedsBalance {
        payoff: Money,
        provided: Money,
    },

    #[error("invalid loan terms: {message}")]
    InvalidLoanTerms {
        message: String,
    },

    #[error("invalid payment amount: {amount}")]
    InvalidPaymentAmount {
        amount: Money,
    },

    #[error("invalid status transition: {from:?} -> {to:?}")]
    InvalidStatusTransition {
        from: LoanStatus,
        to: LoanStatus,
    },

    #[error("installment {installment_id} is {status:?}, expected Scheduled")]
    InstallmentNotScheduled {
        installment_id: InstallmentId,
        status: InstallmentStatus,
    },

    #[error("loan not found: {loan_id}")]
    LoanNotFound {
        loan_id: LoanId,
    },

    #[error("loan already exists: {loan_id}")]
    LoanAlreadyExists {
        loan_id: LoanId,
    },

    #[error("repository error: {message}")]
    Repository {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("calculation error: {message}")]
    CalculationError {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, LoanError>;
