use hourglass_rs::SafeTimeProvider;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::events::{AuditEvent, EventStore};
use crate::lifecycle::LoanLifecycle;
use crate::loan::{Installment, LoanRecord};
use crate::types::{InstallmentKind, OverpaymentPolicy};

use super::matcher::PaymentMatcher;
use super::reamortize::Reamortizer;
use super::{PaymentIntent, PaymentOutcome};

/// Validates an incoming payment and applies it to the next due installment.
///
/// Works on a copy of the record: on any rejected precondition the caller's
/// record and event store are left exactly as they were.
pub struct PaymentApplier<'a> {
    config: &'a EngineConfig,
}

impl<'a> PaymentApplier<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    pub fn apply(
        &self,
        record: &LoanRecord,
        intent: &PaymentIntent,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<PaymentOutcome> {
        LoanLifecycle::ensure_accepts_payments(&record.loan)?;
        let matched_idx = PaymentMatcher::match_next(record)?;
        let matched = &record.installments[matched_idx];

        if !intent.amount.is_positive() {
            return Err(LoanError::InvalidPaymentAmount {
                amount: intent.amount,
            });
        }

        if intent.amount < matched.amount_due {
            debug!(
                loan_id = %record.loan.id,
                amount_due = %matched.amount_due,
                provided = %intent.amount,
                "payment below amount due"
            );
            return Err(LoanError::InsufficientPayment {
                amount_due: matched.amount_due,
                provided: intent.amount,
                shortfall: matched.amount_due - intent.amount,
            });
        }

        let excess = intent.amount - matched.amount_due;
        let balance_after_match = record.outstanding_balance() - matched.principal_portion;
        let (extra_principal, unapplied) = self.split_excess(excess, balance_after_match, matched, intent)?;

        let now = time_provider.now();
        let mut updated = record.clone();
        let mut local_events = EventStore::new();

        let installment_id = updated.installments[matched_idx].id;
        let due_date = updated.installments[matched_idx].due_date;
        updated.installments[matched_idx].mark_paid(
            now,
            intent.payment_method.clone(),
            intent.reference.clone(),
            intent.notes.clone(),
        )?;

        if extra_principal.is_positive() {
            let mut prepayment = Installment::scheduled(
                updated.loan.id,
                updated.next_sequence(),
                due_date,
                extra_principal,
                Money::ZERO,
                Money::ZERO,
                InstallmentKind::Prepayment,
            );
            prepayment.mark_paid(
                now,
                intent.payment_method.clone(),
                Some(
                    intent
                        .reference
                        .clone()
                        .unwrap_or_else(|| self.config.prepayment_reference.clone()),
                ),
                intent.notes.clone(),
            )?;
            updated.installments.push(prepayment);
        }

        local_events.emit(AuditEvent::PaymentProcessed {
            loan_id: updated.loan.id,
            installment_id,
            amount: intent.amount,
            payment_method: intent.payment_method.clone(),
            reference: intent.reference.clone(),
            extra_principal_applied: extra_principal,
            unapplied_amount: unapplied,
            timestamp: now,
        });

        // recast after a prepayment, or settle once nothing is left to collect
        let reamortization = if extra_principal.is_positive() || PaymentMatcher::next_due(&updated).is_none() {
            Some(Reamortizer::new(self.config).reamortize(
                &mut updated,
                extra_principal,
                now,
                &mut local_events,
            )?)
        } else {
            None
        };

        let completed = reamortization
            .as_ref()
            .map_or(false, |outcome| outcome.completed_loan());

        info!(
            loan_id = %updated.loan.id,
            %installment_id,
            amount = %intent.amount,
            %extra_principal,
            %unapplied,
            outstanding = %updated.outstanding_balance(),
            completed,
            "payment applied"
        );

        events.emit_all(local_events.take_events());

        Ok(PaymentOutcome {
            loan_status: updated.loan.status,
            record: updated,
            installment_id,
            excess_principal: extra_principal,
            unapplied_amount: unapplied,
            completed,
            reamortization,
        })
    }

    /// split the excess into principal prepayment and an unapplied remainder
    fn split_excess(
        &self,
        excess: Money,
        balance_after_match: Money,
        matched: &Installment,
        intent: &PaymentIntent,
    ) -> Result<(Money, Money)> {
        let balance_after_match = balance_after_match.max(Money::ZERO);
        if excess <= balance_after_match {
            return Ok((excess, Money::ZERO));
        }

        match self.config.overpayment_policy {
            OverpaymentPolicy::Reject => Err(LoanError::PaymentExceedsBalance {
                payoff: matched.amount_due + balance_after_match,
                provided: intent.amount,
            }),
            OverpaymentPolicy::CapAtBalance => {
                let unapplied = excess - balance_after_match;
                warn!(
                    loan_id = %matched.loan_id,
                    %unapplied,
                    "payment exceeds payoff amount, remainder left unapplied"
                );
                Ok((balance_after_match, unapplied))
            }
        }
    }
}
