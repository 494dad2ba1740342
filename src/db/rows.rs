//! Raw MySQL rows and their conversion into domain types. Enum columns are
//! stored as their snake_case names.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

use crate::model::{
    approval_step::ApprovalStep,
    employee::Employee,
    leave_balance::LeaveBalance,
    leave_policy::LeavePolicy,
    leave_request::LeaveRequest,
    user::User,
};
use crate::workflow::error::WorkflowError;

fn parse_column<T: FromStr>(column: &str, value: &str) -> Result<T, WorkflowError> {
    T::from_str(value).map_err(|_| {
        WorkflowError::Persistence(format!("unexpected value `{}` in column {}", value, column))
    })
}

pub const EMPLOYEE_COLUMNS: &str =
    "id, employee_code, name, email, position, department_id, manager_id, joining_date, status";

#[derive(Debug, FromRow)]
pub struct EmployeeRow {
    pub id: u64,
    pub employee_code: String,
    pub name: String,
    pub email: Option<String>,
    pub position: String,
    pub department_id: u64,
    pub manager_id: Option<u64>,
    pub joining_date: NaiveDate,
    pub status: String,
}

impl TryFrom<EmployeeRow> for Employee {
    type Error = WorkflowError;

    fn try_from(row: EmployeeRow) -> Result<Self, Self::Error> {
        Ok(Employee {
            status: parse_column("employees.status", &row.status)?,
            id: row.id,
            employee_code: row.employee_code,
            name: row.name,
            email: row.email,
            position: row.position,
            department_id: row.department_id,
            manager_id: row.manager_id,
            joining_date: row.joining_date,
        })
    }
}

pub const POLICY_COLUMNS: &str = "id, leave_type, annual_limit, min_days_notice, max_consecutive_days, \
     carry_forward_allowed, carry_forward_limit, requires_medical_certificate, is_active";

#[derive(Debug, FromRow)]
pub struct PolicyRow {
    pub id: u64,
    pub leave_type: String,
    pub annual_limit: i32,
    pub min_days_notice: i32,
    pub max_consecutive_days: i32,
    pub carry_forward_allowed: bool,
    pub carry_forward_limit: Option<i32>,
    pub requires_medical_certificate: bool,
    pub is_active: bool,
}

impl TryFrom<PolicyRow> for LeavePolicy {
    type Error = WorkflowError;

    fn try_from(row: PolicyRow) -> Result<Self, Self::Error> {
        Ok(LeavePolicy {
            id: row.id,
            leave_type: parse_column("leave_policies.leave_type", &row.leave_type)?,
            annual_limit: row.annual_limit,
            min_days_notice: row.min_days_notice,
            max_consecutive_days: row.max_consecutive_days,
            carry_forward_allowed: row.carry_forward_allowed,
            carry_forward_limit: row.carry_forward_limit,
            requires_medical_certificate: row.requires_medical_certificate,
            is_active: row.is_active,
        })
    }
}

pub const BALANCE_COLUMNS: &str =
    "employee_id, leave_type, year, total_days, used_days, remaining_days";

#[derive(Debug, FromRow)]
pub struct BalanceRow {
    pub employee_id: u64,
    pub leave_type: String,
    pub year: i32,
    pub total_days: i32,
    pub used_days: i32,
    pub remaining_days: i32,
}

impl TryFrom<BalanceRow> for LeaveBalance {
    type Error = WorkflowError;

    fn try_from(row: BalanceRow) -> Result<Self, Self::Error> {
        Ok(LeaveBalance {
            employee_id: row.employee_id,
            leave_type: parse_column("leave_balances.leave_type", &row.leave_type)?,
            year: row.year,
            total_days: row.total_days,
            used_days: row.used_days,
            remaining_days: row.remaining_days,
        })
    }
}

pub const REQUEST_COLUMNS: &str = "id, employee_id, leave_type, from_date, to_date, reason, \
     days_count, medical_certificate, status, created_at, updated_at";

#[derive(Debug, FromRow)]
pub struct LeaveRequestRow {
    pub id: u64,
    pub employee_id: u64,
    pub leave_type: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub reason: String,
    pub days_count: i32,
    pub medical_certificate: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<LeaveRequestRow> for LeaveRequest {
    type Error = WorkflowError;

    fn try_from(row: LeaveRequestRow) -> Result<Self, Self::Error> {
        Ok(LeaveRequest {
            id: row.id,
            employee_id: row.employee_id,
            leave_type: parse_column("leave_requests.leave_type", &row.leave_type)?,
            from_date: row.from_date,
            to_date: row.to_date,
            reason: row.reason,
            days_count: row.days_count,
            medical_certificate: row.medical_certificate,
            status: parse_column("leave_requests.status", &row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub const STEP_COLUMNS: &str =
    "step_order, approver_role, approver_id, status, comments, approved_at, is_current";

#[derive(Debug, FromRow)]
pub struct ApprovalStepRow {
    pub step_order: u32,
    pub approver_role: String,
    pub approver_id: Option<u64>,
    pub status: String,
    pub comments: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub is_current: bool,
}

impl TryFrom<ApprovalStepRow> for ApprovalStep {
    type Error = WorkflowError;

    fn try_from(row: ApprovalStepRow) -> Result<Self, Self::Error> {
        Ok(ApprovalStep {
            step_order: row.step_order,
            approver_role: parse_column("approval_steps.approver_role", &row.approver_role)?,
            approver_id: row.approver_id,
            status: parse_column("approval_steps.status", &row.status)?,
            comments: row.comments,
            approved_at: row.approved_at,
            is_current: row.is_current,
        })
    }
}

pub const USER_COLUMNS: &str = "id, username, password, role, employee_id, is_active";

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: u64,
    pub username: String,
    pub password: String,
    pub role: String,
    pub employee_id: Option<u64>,
    pub is_active: bool,
}

impl TryFrom<UserRow> for User {
    type Error = WorkflowError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            role: parse_column("users.role", &row.role)?,
            id: row.id,
            username: row.username,
            password: row.password,
            employee_id: row.employee_id,
            is_active: row.is_active,
        })
    }
}

/// Converts a batch of rows, failing on the first bad one.
pub fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, WorkflowError>
where
    T: TryFrom<R, Error = WorkflowError>,
{
    rows.into_iter().map(T::try_from).collect()
}
