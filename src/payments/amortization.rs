use chrono::{Months, NaiveDate};
use hourglass_rs::SafeTimeProvider;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::events::{AuditEvent, EventStore};
use crate::loan::{Installment, Loan, LoanRecord, LoanTerms};
use crate::types::{InstallmentKind, LoanId};

/// principal/interest split of one period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodSplit {
    pub principal: Money,
    pub interest: Money,
}

/// builds the initial schedule for a new loan
pub struct ScheduleGenerator<'a> {
    config: &'a EngineConfig,
}

impl<'a> ScheduleGenerator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// validate the terms and produce a pending loan with its full schedule
    pub fn generate(
        &self,
        terms: &LoanTerms,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<LoanRecord> {
        terms.validate(self.config)?;

        let now = time_provider.now();
        let monthly_rate = terms.annual_rate.monthly_rate();
        let payment = level_payment(terms.principal, monthly_rate, terms.term_months)?;

        let loan = Loan::new(terms, payment, now);
        let installments = build_installments(
            loan.id,
            terms.principal,
            monthly_rate,
            payment,
            terms.term_months,
            terms.start_date,
            terms.fee_per_installment,
        )?;

        let total_interest: Money = installments.iter().map(|i| i.interest_portion).sum();

        info!(
            loan_id = %loan.id,
            principal = %terms.principal,
            rate = %terms.annual_rate,
            term_months = terms.term_months,
            monthly_payment = %payment,
            total_interest = %total_interest,
            "schedule generated"
        );

        events.emit(AuditEvent::ScheduleGenerated {
            loan_id: loan.id,
            principal: terms.principal,
            installments: terms.term_months,
            monthly_payment: payment,
            total_interest,
            timestamp: now,
        });

        Ok(LoanRecord::new(loan, installments))
    }
}

/// build `term_months` scheduled installments amortizing `principal`
pub fn build_installments(
    loan_id: LoanId,
    principal: Money,
    monthly_rate: Rate,
    payment: Money,
    term_months: u32,
    start_date: NaiveDate,
    fee: Money,
) -> Result<Vec<Installment>> {
    split_level_payment(principal, monthly_rate, payment, term_months)
        .into_iter()
        .enumerate()
        .map(|(idx, split)| {
            let sequence = idx as u32 + 1;
            let due_date = add_months(start_date, sequence)?;
            Ok(Installment::scheduled(
                loan_id,
                sequence,
                due_date,
                split.principal,
                split.interest,
                fee,
                InstallmentKind::Regular,
            ))
        })
        .collect()
}

/// Standard level payment for `balance` over `periods`.
///
/// Annuity formula `P * r * (1 + r)^n / ((1 + r)^n - 1)` rounded half-up to the
/// cent. At a zero rate the balance is divided equally, truncated to the cent so
/// the last period absorbs a non-negative remainder.
///
/// Fails with `CalculationError` when `(1 + r)^n` or the numerator leaves the
/// range of `Decimal`.
pub fn level_payment(balance: Money, monthly_rate: Rate, periods: u32) -> Result<Money> {
    if periods == 0 {
        return Ok(balance);
    }

    if monthly_rate.is_zero() {
        return Ok(balance.div_floor(periods));
    }

    let overflow = || LoanError::CalculationError {
        message: format!(
            "level payment overflows for {} periods at {} per period",
            periods, monthly_rate
        ),
    };

    let r = monthly_rate.as_decimal();
    let mut compound = Decimal::ONE;
    let base = Decimal::ONE + r;
    for _ in 0..periods {
        compound = compound.checked_mul(base).ok_or_else(overflow)?;
    }

    let numerator = balance
        .as_decimal()
        .checked_mul(r)
        .and_then(|n| n.checked_mul(compound))
        .ok_or_else(overflow)?;
    let denominator = compound - Decimal::ONE;

    numerator
        .checked_div(denominator)
        .map(Money::from_decimal)
        .ok_or_else(overflow)
}

/// Walk `periods` installments of `payment` over `balance`.
///
/// Each period's interest is the running balance times the rate; the principal
/// is the payment less interest, never more than the balance left. The last
/// period takes exactly the remaining balance, so the principal column always
/// sums to `balance`.
pub fn split_level_payment(
    balance: Money,
    monthly_rate: Rate,
    payment: Money,
    periods: u32,
) -> Vec<PeriodSplit> {
    let mut splits = Vec::with_capacity(periods as usize);
    let mut cursor = balance;

    for period in 1..=periods {
        let interest = cursor.interest_at(monthly_rate);
        let principal = if period == periods {
            cursor
        } else {
            (payment - interest).min(cursor).max(Money::ZERO)
        };

        cursor -= principal;
        splits.push(PeriodSplit { principal, interest });
    }

    debug!(
        balance = %balance,
        payment = %payment,
        periods,
        "level payment split"
    );

    splits
}

/// add calendar months, clamping to the end of shorter months
pub fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| LoanError::CalculationError {
            message: format!("due date out of range: {} + {} months", date, months),
        })
}
