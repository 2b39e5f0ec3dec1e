use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::errors::{LoanError, Result};
use crate::loan::LoanRecord;
use crate::types::LoanId;

/// Storage for loans and their installments.
///
/// `transact` is the unit of work for everything that mutates a loan: it runs
/// with exclusive access to that one loan and commits only when the closure
/// succeeds. Work on different loans never contends.
pub trait LoanRepository: Send + Sync {
    fn insert(&self, record: LoanRecord) -> Result<()>;

    fn load(&self, loan_id: LoanId) -> Result<LoanRecord>;

    fn transact<T, F>(&self, loan_id: LoanId, f: F) -> Result<T>
    where
        F: FnOnce(&mut LoanRecord) -> Result<T>;
}

/// in-memory repository with one lock per loan
#[derive(Debug, Default)]
pub struct InMemoryLoanRepository {
    loans: RwLock<HashMap<LoanId, Arc<Mutex<LoanRecord>>>>,
}

impl InMemoryLoanRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.loans.read().map(|loans| loans.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, loan_id: LoanId) -> Result<Arc<Mutex<LoanRecord>>> {
        let loans = self.loans.read().map_err(|_| poisoned("loan index"))?;
        loans
            .get(&loan_id)
            .cloned()
            .ok_or(LoanError::LoanNotFound { loan_id })
    }
}

fn poisoned(what: &str) -> LoanError {
    LoanError::Repository {
        message: format!("{} lock poisoned", what),
    }
}

impl LoanRepository for InMemoryLoanRepository {
    fn insert(&self, record: LoanRecord) -> Result<()> {
        let loan_id = record.loan_id();
        let mut loans = self.loans.write().map_err(|_| poisoned("loan index"))?;
        if loans.contains_key(&loan_id) {
            return Err(LoanError::LoanAlreadyExists { loan_id });
        }
        loans.insert(loan_id, Arc::new(Mutex::new(record)));
        Ok(())
    }

    fn load(&self, loan_id: LoanId) -> Result<LoanRecord> {
        let entry = self.entry(loan_id)?;
        let record = entry.lock().map_err(|_| poisoned("loan"))?;
        Ok(record.clone())
    }

    fn transact<T, F>(&self, loan_id: LoanId, f: F) -> Result<T>
    where
        F: FnOnce(&mut LoanRecord) -> Result<T>,
    {
        let entry = self.entry(loan_id)?;
        let mut stored = entry.lock().map_err(|_| poisoned("loan"))?;

        let mut working = stored.clone();
        let value = f(&mut working)?;
        *stored = working;
        Ok(value)
    }
}
