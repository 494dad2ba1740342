use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::leave_request::LeaveType;

/// Ledger row for one (employee, leave type, year).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "employee_id": 4,
    "leave_type": "casual",
    "year": 2026,
    "total_days": 12,
    "used_days": 2,
    "remaining_days": 10
}))]
pub struct LeaveBalance {
    pub employee_id: u64,
    pub leave_type: LeaveType,
    pub year: i32,
    pub total_days: i32,
    pub used_days: i32,
    pub remaining_days: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerKey {
    pub employee_id: u64,
    pub leave_type: LeaveType,
    pub year: i32,
}
