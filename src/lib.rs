pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod lifecycle;
pub mod loan;
pub mod payments;
pub mod repository;
pub mod serialization;
pub mod servicer;
pub mod types;

// re-export key types
pub use config::EngineConfig;
pub use decimal::{Money, Rate};
pub use errors::{LoanError, Result};
pub use events::{AuditEmitter, AuditEvent, AuditRecord, EventStore, InMemoryAuditLog};
pub use lifecycle::LoanLifecycle;
pub use loan::{Installment, Loan, LoanRecord, LoanTerms};
pub use payments::{
    PaymentApplier, PaymentIntent, PaymentMatcher, PaymentOutcome, ReamortizeAction,
    ReamortizeOutcome, Reamortizer, ScheduleGenerator,
};
pub use repository::{InMemoryLoanRepository, LoanRepository};
pub use serialization::LoanView;
pub use servicer::LoanServicer;
pub use types::{
    InstallmentId, InstallmentKind, InstallmentStatus, LoanId, LoanStatus, OverpaymentPolicy,
    PaymentMethod,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
