use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::events::{AuditEvent, EventStore};
use crate::lifecycle::LoanLifecycle;
use crate::loan::{Installment, LoanRecord};
use crate::types::{InstallmentId, InstallmentKind, LoanStatus};

use super::amortization::{level_payment, split_level_payment};

/// what re-amortization did to the schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReamortizeAction {
    /// nothing left to collect; loan completed
    Completed,
    /// term exhausted with a balance left; one balloon installment added
    BalloonScheduled {
        installment_id: InstallmentId,
        amount: Money,
    },
    /// balance settled early; remaining installments cancelled and loan completed
    PaidOff { cancelled: u32 },
    /// remaining installments recast to a new level payment
    Recast {
        old_payment: Money,
        new_payment: Money,
        remaining_installments: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReamortizeOutcome {
    pub outstanding_balance: Money,
    pub action: ReamortizeAction,
}

impl ReamortizeOutcome {
    pub fn completed_loan(&self) -> bool {
        matches!(
            self.action,
            ReamortizeAction::Completed | ReamortizeAction::PaidOff { .. }
        )
    }
}

/// Recomputes the unpaid part of a schedule after its outstanding balance moved.
///
/// The number of remaining installments is kept (recast, not term reduction).
pub struct Reamortizer<'a> {
    config: &'a EngineConfig,
}

impl<'a> Reamortizer<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Recompute scheduled installments against the balance implied by paid rows.
    ///
    /// `extra_principal` is the prepayment that triggered the recast; it must
    /// already be recorded as a paid row and is only reported here.
    pub fn reamortize(
        &self,
        record: &mut LoanRecord,
        extra_principal: Money,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<ReamortizeOutcome> {
        let outstanding = record.outstanding_balance();
        if outstanding.is_negative() {
            return Err(LoanError::CalculationError {
                message: format!(
                    "paid principal exceeds loan principal by {}",
                    outstanding.abs()
                ),
            });
        }

        let remaining = record.scheduled_indices();
        let settled = self.config.is_settled(outstanding);

        let action = match (remaining.is_empty(), settled) {
            (true, true) => {
                LoanLifecycle::complete(&mut record.loan, "all installments paid", now, events)?;
                ReamortizeAction::Completed
            }
            (true, false) => self.schedule_balloon(record, outstanding, now, events)?,
            (false, true) => self.pay_off(record, &remaining, now, events)?,
            (false, false) => self.recast(record, &remaining, outstanding, extra_principal, now, events)?,
        };

        Ok(ReamortizeOutcome {
            outstanding_balance: outstanding,
            action,
        })
    }

    fn schedule_balloon(
        &self,
        record: &mut LoanRecord,
        outstanding: Money,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<ReamortizeAction> {
        let last_due = record.last_due_date().unwrap_or(record.loan.start_date);
        let due_date = last_due
            .checked_add_signed(Duration::days(self.config.balloon_offset_days))
            .ok_or_else(|| LoanError::CalculationError {
                message: format!("balloon due date out of range after {}", last_due),
            })?;

        let balloon = Installment::scheduled(
            record.loan.id,
            record.next_sequence(),
            due_date,
            outstanding,
            Money::ZERO,
            Money::ZERO,
            InstallmentKind::Balloon,
        );
        let installment_id = balloon.id;
        record.installments.push(balloon);

        warn!(
            loan_id = %record.loan.id,
            amount = %outstanding,
            %due_date,
            "term exhausted with balance outstanding, balloon scheduled"
        );

        events.emit(AuditEvent::BalloonScheduled {
            loan_id: record.loan.id,
            installment_id,
            amount: outstanding,
            due_date,
            timestamp: now,
        });

        Ok(ReamortizeAction::BalloonScheduled {
            installment_id,
            amount: outstanding,
        })
    }

    fn pay_off(
        &self,
        record: &mut LoanRecord,
        remaining: &[usize],
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<ReamortizeAction> {
        if !LoanLifecycle::can_transition(record.loan.status, LoanStatus::Completed) {
            return Err(LoanError::InvalidStatusTransition {
                from: record.loan.status,
                to: LoanStatus::Completed,
            });
        }

        for &idx in remaining {
            record.installments[idx].cancel()?;
        }
        record.loan.current_monthly_payment = Money::ZERO;

        let cancelled = remaining.len() as u32;
        info!(loan_id = %record.loan.id, cancelled, "loan paid off early");

        events.emit(AuditEvent::InstallmentsCancelled {
            loan_id: record.loan.id,
            count: cancelled,
            timestamp: now,
        });
        LoanLifecycle::complete(&mut record.loan, "paid off early", now, events)?;

        Ok(ReamortizeAction::PaidOff { cancelled })
    }

    fn recast(
        &self,
        record: &mut LoanRecord,
        remaining: &[usize],
        outstanding: Money,
        extra_principal: Money,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<ReamortizeAction> {
        let rate = record.loan.monthly_rate();
        // at least one cent of principal per kept row; later rows are dropped
        let keep = remaining
            .len()
            .min(usize::try_from(outstanding.minor_units()).unwrap_or(usize::MAX));
        let (kept, dropped) = remaining.split_at(keep);
        let periods = kept.len() as u32;
        let old_payment = record.loan.current_monthly_payment;
        let new_payment = level_payment(outstanding, rate, periods)?;

        for &idx in dropped {
            record.installments[idx].cancel()?;
        }
        if !dropped.is_empty() {
            warn!(
                loan_id = %record.loan.id,
                %outstanding,
                cancelled = dropped.len(),
                "balance too small for remaining term, trailing installments cancelled"
            );
            events.emit(AuditEvent::InstallmentsCancelled {
                loan_id: record.loan.id,
                count: dropped.len() as u32,
                timestamp: now,
            });
        }

        let splits = split_level_payment(outstanding, rate, new_payment, periods);
        for (&idx, split) in kept.iter().zip(splits) {
            record.installments[idx].set_portions(split.principal, split.interest);
        }
        record.loan.current_monthly_payment = new_payment;

        info!(
            loan_id = %record.loan.id,
            %extra_principal,
            %outstanding,
            %old_payment,
            %new_payment,
            remaining = periods,
            "loan re-amortized"
        );

        events.emit(AuditEvent::LoanReamortized {
            loan_id: record.loan.id,
            extra_principal,
            old_payment,
            new_payment,
            outstanding_balance: outstanding,
            remaining_installments: periods,
            timestamp: now,
        });

        Ok(ReamortizeAction::Recast {
            old_payment,
            new_payment,
            remaining_installments: periods,
        })
    }
}
