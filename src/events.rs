use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::types::{InstallmentId, LoanId, LoanStatus, PaymentMethod};

/// everything the engine decides that the host must be told about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum AuditEvent {
    ScheduleGenerated {
        loan_id: LoanId,
        principal: Money,
        installments: u32,
        monthly_payment: Money,
        total_interest: Money,
        timestamp: DateTime<Utc>,
    },
    PaymentProcessed {
        loan_id: LoanId,
        installment_id: InstallmentId,
        amount: Money,
        payment_method: PaymentMethod,
        reference: Option<String>,
        extra_principal_applied: Money,
        unapplied_amount: Money,
        timestamp: DateTime<Utc>,
    },
    LoanReamortized {
        loan_id: LoanId,
        extra_principal: Money,
        old_payment: Money,
        new_payment: Money,
        outstanding_balance: Money,
        remaining_installments: u32,
        timestamp: DateTime<Utc>,
    },
    BalloonScheduled {
        loan_id: LoanId,
        installment_id: InstallmentId,
        amount: Money,
        due_date: NaiveDate,
        timestamp: DateTime<Utc>,
    },
    InstallmentsCancelled {
        loan_id: LoanId,
        count: u32,
        timestamp: DateTime<Utc>,
    },
    StatusChanged {
        loan_id: LoanId,
        old_status: LoanStatus,
        new_status: LoanStatus,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl AuditEvent {
    /// stable kind string hosts key their audit log on
    pub fn kind(&self) -> &'static str {
        match self {
            AuditEvent::ScheduleGenerated { .. } => "SCHEDULE_GENERATED",
            AuditEvent::PaymentProcessed { .. } => "PAYMENT_PROCESSED",
            AuditEvent::LoanReamortized { .. } => "LOAN_REAMORTIZED",
            AuditEvent::BalloonScheduled { .. } => "BALLOON_SCHEDULED",
            AuditEvent::InstallmentsCancelled { .. } => "INSTALLMENTS_CANCELLED",
            AuditEvent::StatusChanged { .. } => "STATUS_CHANGED",
        }
    }

    pub fn loan_id(&self) -> LoanId {
        match self {
            AuditEvent::ScheduleGenerated { loan_id, .. }
            | AuditEvent::PaymentProcessed { loan_id, .. }
            | AuditEvent::LoanReamortized { loan_id, .. }
            | AuditEvent::BalloonScheduled { loan_id, .. }
            | AuditEvent::InstallmentsCancelled { loan_id, .. }
            | AuditEvent::StatusChanged { loan_id, .. } => *loan_id,
        }
    }

    pub fn payload(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| LoanError::CalculationError {
            message: format!("failed to encode {} event: {}", self.kind(), e),
        })
    }
}

/// event store for collecting events during an operation
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<AuditEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: AuditEvent) {
        self.events.push(event);
    }

    pub fn emit_all(&mut self, events: impl IntoIterator<Item = AuditEvent>) {
        self.events.extend(events);
    }

    pub fn take_events(&mut self) -> Vec<AuditEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// audit sink owned by the host
pub trait AuditEmitter: Send + Sync {
    fn record(&self, event_kind: &str, resource_id: LoanId, payload: serde_json::Value) -> Result<()>;

    fn record_event(&self, event: &AuditEvent) -> Result<()> {
        self.record(event.kind(), event.loan_id(), event.payload()?)
    }
}

/// one stored audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event_kind: String,
    pub resource_id: LoanId,
    pub payload: serde_json::Value,
}

/// in-memory audit log, mostly for tests and demos
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn records_of_kind(&self, event_kind: &str) -> Vec<AuditRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.event_kind == event_kind)
            .collect()
    }
}

impl AuditEmitter for InMemoryAuditLog {
    fn record(&self, event_kind: &str, resource_id: LoanId, payload: serde_json::Value) -> Result<()> {
        let mut records = self.records.lock().map_err(|_| LoanError::Repository {
            message: "audit log lock poisoned".to_string(),
        })?;
        records.push(AuditRecord {
            event_kind: event_kind.to_string(),
            resource_id,
            payload,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn payment_event(loan_id: LoanId) -> AuditEvent {
        AuditEvent::PaymentProcessed {
            loan_id,
            installment_id: Uuid::new_v4(),
            amount: Money::from_str_exact("18606.64").unwrap(),
            payment_method: PaymentMethod::BankTransfer,
            reference: Some("wire-42".to_string()),
            extra_principal_applied: Money::from_major(10_000),
            unapplied_amount: Money::ZERO,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_event_store_take() {
        let mut store = EventStore::new();
        store.emit(payment_event(Uuid::new_v4()));
        assert_eq!(store.events().len(), 1);

        let taken = store.take_events();
        assert_eq!(taken.len(), 1);
        assert!(store.events().is_empty());
    }

    #[test]
    fn test_payment_payload_shape() {
        let loan_id = Uuid::new_v4();
        let payload = payment_event(loan_id).payload().unwrap();

        assert_eq!(payload["event"], "PaymentProcessed");
        assert_eq!(payload["amount"], "18606.64");
        assert_eq!(payload["extra_principal_applied"], "10000.00");
        assert_eq!(payload["unapplied_amount"], "0.00");
        assert_eq!(payload["reference"], "wire-42");
        assert_eq!(payload["payment_method"], "BankTransfer");
    }

    #[test]
    fn test_in_memory_log_records_kind() {
        let log = InMemoryAuditLog::new();
        let loan_id = Uuid::new_v4();
        log.record_event(&payment_event(loan_id)).unwrap();

        let records = log.records_of_kind("PAYMENT_PROCESSED");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].resource_id, loan_id);
        assert!(log.records_of_kind("LOAN_REAMORTIZED").is_empty());
    }
}
