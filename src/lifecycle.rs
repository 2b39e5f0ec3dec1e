use chrono::{DateTime, Utc};
use tracing::info;

use crate::errors::{LoanError, Result};
use crate::events::{AuditEvent, EventStore};
use crate::loan::Loan;
use crate::types::LoanStatus;

/// Loan status state machine.
///
/// ```text
/// Pending -> Approved -> Active -> Completed | Defaulted
///    |           '-----------------> Completed
///    '-> Cancelled
/// ```
pub struct LoanLifecycle;

impl LoanLifecycle {
    pub fn can_transition(from: LoanStatus, to: LoanStatus) -> bool {
        use LoanStatus::*;
        matches!(
            (from, to),
            (Pending, Approved)
                | (Pending, Cancelled)
                | (Approved, Active)
                | (Approved, Completed)
                | (Active, Completed)
                | (Active, Defaulted)
        )
    }

    /// only approved or active loans take payments
    pub fn accepts_payments(status: LoanStatus) -> bool {
        matches!(status, LoanStatus::Approved | LoanStatus::Active)
    }

    pub fn ensure_accepts_payments(loan: &Loan) -> Result<()> {
        if !Self::accepts_payments(loan.status) {
            return Err(LoanError::InvalidLoanStatus {
                status: loan.status,
            });
        }
        Ok(())
    }

    /// move the loan to `to`, recording a status change event
    pub fn transition(
        loan: &mut Loan,
        to: LoanStatus,
        reason: &str,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<()> {
        let from = loan.status;
        if !Self::can_transition(from, to) {
            return Err(LoanError::InvalidStatusTransition { from, to });
        }

        loan.status = to;
        loan.status_changed_at = now;

        info!(loan_id = %loan.id, ?from, ?to, reason, "loan status changed");

        events.emit(AuditEvent::StatusChanged {
            loan_id: loan.id,
            old_status: from,
            new_status: to,
            reason: reason.to_string(),
            timestamp: now,
        });

        Ok(())
    }

    /// terminal repayment transition
    pub fn complete(
        loan: &mut Loan,
        reason: &str,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<()> {
        Self::transition(loan, LoanStatus::Completed, reason, now, events)
    }
}
