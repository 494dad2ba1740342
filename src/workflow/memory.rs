//! In-process `WorkflowStore` for tests. One mutex guards all state, so
//! every `update_locked` call is serialized.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Datelike, NaiveDate, Utc};

use crate::model::{
    employee::{Employee, EmployeeStatus},
    leave_balance::{LeaveBalance, LedgerKey},
    leave_policy::LeavePolicy,
    leave_request::{LeaveRequest, LeaveStatus, LeaveType},
    role::Role,
};
use crate::workflow::{
    chain::ApprovalChain,
    error::WorkflowError,
    ledger::Ledger,
    policy::LeaveDraft,
    store::{WorkflowRecord, WorkflowStore},
};

#[derive(Default)]
struct State {
    next_id: u64,
    employees: HashMap<u64, Employee>,
    policies: Vec<LeavePolicy>,
    ledger: Ledger,
    holidays: Vec<NaiveDate>,
    requests: HashMap<u64, (LeaveRequest, ApprovalChain)>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn employee(id: u64, department_id: u64, manager_id: Option<u64>) -> Employee {
    Employee {
        id,
        employee_code: format!("EMP{:03}", id),
        name: format!("Employee {}", id),
        email: None,
        position: "Staff".to_string(),
        department_id,
        manager_id,
        joining_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        status: EmployeeStatus::Active,
    }
}

fn policy(id: u64, leave_type: LeaveType, limit: i32, notice: i32, max: i32) -> LeavePolicy {
    LeavePolicy {
        id,
        leave_type,
        annual_limit: limit,
        min_days_notice: notice,
        max_consecutive_days: max,
        carry_forward_allowed: false,
        carry_forward_limit: None,
        requires_medical_certificate: false,
        is_active: true,
    }
}

impl MemoryStore {
    /// Admin 1 and HR 2 in department 2; manager 3 with reports 4 and 5 in
    /// department 1; employee 6 with no manager; manager 7 with no reports.
    /// Employee 4 holds casual and sick balances for the year of `today`,
    /// employee 6 a fresh casual one.
    pub fn seeded(today: NaiveDate) -> Self {
        let mut state = State::default();
        for e in [
            employee(1, 2, None),
            employee(2, 2, Some(1)),
            employee(3, 1, Some(1)),
            employee(4, 1, Some(3)),
            employee(5, 1, Some(3)),
            employee(6, 1, None),
            employee(7, 1, Some(1)),
        ] {
            state.employees.insert(e.id, e);
        }

        let mut casual = policy(1, LeaveType::Casual, 12, 2, 5);
        casual.carry_forward_allowed = true;
        casual.carry_forward_limit = Some(5);
        let mut sick = policy(2, LeaveType::Sick, 10, 0, 10);
        sick.requires_medical_certificate = true;
        let mut personal = policy(3, LeaveType::Personal, 5, 1, 3);
        personal.is_active = false;
        state.policies = vec![casual, sick, personal];

        let year = today.year();
        let mut casual_balance = LeaveBalance::open(
            LedgerKey {
                employee_id: 4,
                leave_type: LeaveType::Casual,
                year,
            },
            12,
        );
        casual_balance.used_days = 2;
        casual_balance.remaining_days = 10;
        state.ledger.put(casual_balance);
        let mut sick_balance = LeaveBalance::open(
            LedgerKey {
                employee_id: 4,
                leave_type: LeaveType::Sick,
                year,
            },
            10,
        );
        sick_balance.used_days = 1;
        sick_balance.remaining_days = 9;
        state.ledger.put(sick_balance);
        state.ledger.put(LeaveBalance::open(
            LedgerKey {
                employee_id: 6,
                leave_type: LeaveType::Casual,
                year,
            },
            12,
        ));

        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory store poisoned")
    }

    pub fn balance_of(&self, key: &LedgerKey) -> Option<LeaveBalance> {
        self.lock().ledger.get(key).cloned()
    }

    pub fn set_remaining(&self, key: &LedgerKey, remaining: i32) {
        let mut state = self.lock();
        if let Some(mut balance) = state.ledger.get(key).cloned() {
            balance.remaining_days = remaining;
            balance.total_days = balance.used_days + remaining;
            state.ledger.put(balance);
        }
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn add_holiday(&self, date: NaiveDate) {
        self.lock().holidays.push(date);
    }

    pub fn retire(&self, employee_id: u64) {
        if let Some(e) = self.lock().employees.get_mut(&employee_id) {
            e.status = EmployeeStatus::Inactive;
        }
    }
}

impl WorkflowStore for MemoryStore {
    async fn employee(&self, id: u64) -> Result<Option<Employee>, WorkflowError> {
        Ok(self.lock().employees.get(&id).cloned())
    }

    async fn policy_for(&self, leave_type: LeaveType) -> Result<Option<LeavePolicy>, WorkflowError> {
        let state = self.lock();
        let mut matching: Vec<&LeavePolicy> = state
            .policies
            .iter()
            .filter(|p| p.leave_type == leave_type)
            .collect();
        matching.sort_by_key(|p| (p.is_active, p.id));
        Ok(matching.last().map(|p| (*p).clone()))
    }

    async fn balance(&self, key: &LedgerKey) -> Result<Option<LeaveBalance>, WorkflowError> {
        Ok(self.lock().ledger.get(key).cloned())
    }

    async fn holidays_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<NaiveDate>, WorkflowError> {
        Ok(self
            .lock()
            .holidays
            .iter()
            .copied()
            .filter(|d| *d >= from && *d <= to)
            .collect())
    }

    async fn insert_request(
        &self,
        draft: &LeaveDraft,
        chain: &ApprovalChain,
    ) -> Result<LeaveRequest, WorkflowError> {
        let mut state = self.lock();
        state.next_id += 1;
        let now = Utc::now();
        let request = LeaveRequest {
            id: state.next_id,
            employee_id: draft.employee_id,
            leave_type: draft.leave_type,
            from_date: draft.from_date,
            to_date: draft.to_date,
            reason: draft.reason.clone(),
            days_count: draft.days_count,
            medical_certificate: draft.medical_certificate,
            status: LeaveStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        state
            .requests
            .insert(request.id, (request.clone(), chain.clone()));
        Ok(request)
    }

    async fn load(&self, request_id: u64) -> Result<Option<(LeaveRequest, ApprovalChain)>, WorkflowError> {
        Ok(self.lock().requests.get(&request_id).cloned())
    }

    async fn pending_for_role(&self, role: Role) -> Result<Vec<LeaveRequest>, WorkflowError> {
        let state = self.lock();
        let mut pending: Vec<LeaveRequest> = state
            .requests
            .values()
            .filter(|(r, chain)| {
                r.status == LeaveStatus::Pending
                    && chain.current().is_some_and(|s| s.approver_role == role)
            })
            .map(|(r, _)| r.clone())
            .collect();
        pending.sort_by_key(|r| r.id);
        Ok(pending)
    }

    async fn update_locked<F, T>(&self, request_id: u64, apply: F) -> Result<T, WorkflowError>
    where
        F: FnOnce(&mut WorkflowRecord) -> Result<T, WorkflowError>,
    {
        let mut state = self.lock();
        let (request, chain) = state
            .requests
            .get(&request_id)
            .cloned()
            .ok_or_else(|| WorkflowError::not_found("leave request", request_id))?;
        let key = LedgerKey::for_request(&request);
        let mut record = WorkflowRecord {
            balance: state.ledger.get(&key).cloned(),
            requester_manager_id: state
                .employees
                .get(&request.employee_id)
                .and_then(|e| e.manager_id),
            request,
            chain,
        };

        // work on a copy; state only changes once `apply` succeeds
        let out = apply(&mut record)?;

        if let Some(balance) = record.balance {
            state.ledger.put(balance);
        }
        state
            .requests
            .insert(request_id, (record.request, record.chain));
        Ok(out)
    }
}
