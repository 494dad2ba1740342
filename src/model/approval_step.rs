use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::{leave_request::LeaveStatus, role::Role};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ApprovalStep {
    #[schema(example = 1)]
    pub step_order: u32,
    #[schema(example = "line_manager")]
    pub approver_role: Role,
    /// Bound once the step is acted upon
    #[schema(example = 3, nullable = true)]
    pub approver_id: Option<u64>,
    #[schema(example = "pending")]
    pub status: LeaveStatus,
    #[schema(nullable = true)]
    pub comments: Option<String>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub approved_at: Option<DateTime<Utc>>,
    pub is_current: bool,
}

impl ApprovalStep {
    pub fn new(step_order: u32, approver_role: Role) -> Self {
        Self {
            step_order,
            approver_role,
            approver_id: None,
            status: LeaveStatus::Pending,
            comments: None,
            approved_at: None,
            is_current: step_order == 1,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}
