#[cfg(test)]
use std::collections::HashMap;

use chrono::Datelike;

use crate::model::{
    leave_balance::{LeaveBalance, LedgerKey},
    leave_request::LeaveRequest,
};
use crate::workflow::error::Violation;

impl LedgerKey {
    /// Requests are charged to the year their range starts in.
    pub fn for_request(request: &LeaveRequest) -> Self {
        Self {
            employee_id: request.employee_id,
            leave_type: request.leave_type,
            year: request.from_date.year(),
        }
    }
}

impl LeaveBalance {
    pub fn open(key: LedgerKey, total_days: i32) -> Self {
        let total_days = total_days.max(0);
        Self {
            employee_id: key.employee_id,
            leave_type: key.leave_type,
            year: key.year,
            total_days,
            used_days: 0,
            remaining_days: total_days,
        }
    }

    #[cfg(test)]
    pub fn key(&self) -> LedgerKey {
        LedgerKey {
            employee_id: self.employee_id,
            leave_type: self.leave_type,
            year: self.year,
        }
    }

    /// Checks that `days` could be committed. Never mutates: pending
    /// requests do not hold days.
    pub fn reserve(&self, days: i32) -> Result<(), Violation> {
        if self.remaining_days < days {
            return Err(Violation::InsufficientBalance {
                requested: days,
                remaining: self.remaining_days,
            });
        }
        Ok(())
    }

    pub fn commit(&mut self, days: i32) -> Result<(), Violation> {
        self.reserve(days)?;
        self.used_days += days;
        self.remaining_days -= days;
        Ok(())
    }

    /// Gives back days of a voided approval. Saturates at zero used days.
    pub fn release(&mut self, days: i32) {
        let days = days.clamp(0, self.used_days);
        self.used_days -= days;
        self.remaining_days += days;
    }

    pub fn is_consistent(&self) -> bool {
        self.used_days >= 0
            && self.remaining_days >= 0
            && self.used_days + self.remaining_days == self.total_days
    }
}

/// In-process ledger over many balances, backing the in-memory store.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    balances: HashMap<LedgerKey, LeaveBalance>,
}

#[cfg(test)]
impl Ledger {
    pub fn open(&mut self, key: LedgerKey, total_days: i32) -> &LeaveBalance {
        self.balances
            .entry(key)
            .or_insert_with(|| LeaveBalance::open(key, total_days))
    }

    pub fn get(&self, key: &LedgerKey) -> Option<&LeaveBalance> {
        self.balances.get(key)
    }

    pub fn put(&mut self, balance: LeaveBalance) {
        self.balances.insert(balance.key(), balance);
    }

    pub fn reserve(&self, key: &LedgerKey, days: i32) -> Result<(), Violation> {
        match self.balances.get(key) {
            Some(balance) => balance.reserve(days),
            None => Err(Violation::InsufficientBalance {
                requested: days,
                remaining: 0,
            }),
        }
    }

    pub fn commit(&mut self, key: &LedgerKey, days: i32) -> Result<(), Violation> {
        match self.balances.get_mut(key) {
            Some(balance) => balance.commit(days),
            None => Err(Violation::InsufficientBalance {
                requested: days,
                remaining: 0,
            }),
        }
    }

    pub fn release(&mut self, key: &LedgerKey, days: i32) {
        if let Some(balance) = self.balances.get_mut(key) {
            balance.release(days);
        }
    }
}
