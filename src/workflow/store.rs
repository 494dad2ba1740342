use chrono::NaiveDate;

use crate::model::{
    employee::Employee,
    leave_balance::{LeaveBalance, LedgerKey},
    leave_policy::LeavePolicy,
    leave_request::{LeaveRequest, LeaveType},
    role::Role,
};
use crate::workflow::{chain::ApprovalChain, error::WorkflowError, policy::LeaveDraft};

/// Everything a decision may touch, loaded under the request's lock.
#[derive(Debug, Clone)]
pub struct WorkflowRecord {
    pub request: LeaveRequest,
    pub chain: ApprovalChain,
    /// Ledger row for the request's (employee, type, year), if one exists
    pub balance: Option<LeaveBalance>,
    pub requester_manager_id: Option<u64>,
}

/// Persistence consumed by the workflow. Implementations must make
/// `insert_request` and `update_locked` all-or-nothing.
#[allow(async_fn_in_trait)]
pub trait WorkflowStore {
    async fn employee(&self, id: u64) -> Result<Option<Employee>, WorkflowError>;

    /// The active policy for a leave type, or the latest inactive one when
    /// none is active.
    async fn policy_for(&self, leave_type: LeaveType) -> Result<Option<LeavePolicy>, WorkflowError>;

    async fn balance(&self, key: &LedgerKey) -> Result<Option<LeaveBalance>, WorkflowError>;

    async fn holidays_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<NaiveDate>, WorkflowError>;

    /// Stores the request as `pending` together with its steps.
    async fn insert_request(
        &self,
        draft: &LeaveDraft,
        chain: &ApprovalChain,
    ) -> Result<LeaveRequest, WorkflowError>;

    async fn load(&self, request_id: u64) -> Result<Option<(LeaveRequest, ApprovalChain)>, WorkflowError>;

    /// Pending requests whose current step is addressed to `role`.
    async fn pending_for_role(&self, role: Role) -> Result<Vec<LeaveRequest>, WorkflowError>;

    /// Locks one request, hands its record to `apply` and persists steps,
    /// request and balance together when `apply` succeeds. Nothing is
    /// written when it fails.
    async fn update_locked<F, T>(&self, request_id: u64, apply: F) -> Result<T, WorkflowError>
    where
        F: FnOnce(&mut WorkflowRecord) -> Result<T, WorkflowError>;
}
