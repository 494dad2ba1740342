use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::leave_request::LeaveType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "leave_type": "casual",
    "annual_limit": 12,
    "min_days_notice": 2,
    "max_consecutive_days": 5,
    "carry_forward_allowed": true,
    "carry_forward_limit": 5,
    "requires_medical_certificate": false,
    "is_active": true
}))]
pub struct LeavePolicy {
    pub id: u64,
    pub leave_type: LeaveType,
    pub annual_limit: i32,
    pub min_days_notice: i32,
    pub max_consecutive_days: i32,
    pub carry_forward_allowed: bool,
    /// `None` means unbounded when carry forward is allowed
    pub carry_forward_limit: Option<i32>,
    pub requires_medical_certificate: bool,
    pub is_active: bool,
}
