use chrono::NaiveDate;
use derive_more::Display;
use serde::Serialize;
use strum_macros::IntoStaticStr;

use crate::model::leave_request::LeaveType;

/// A user-correctable reason a leave request cannot be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Violation {
    #[display(fmt = "the {} leave policy is not active", leave_type)]
    PolicyInactive { leave_type: LeaveType },

    #[display(
        fmt = "request covers {} working days but at most {} consecutive days are allowed",
        requested,
        max
    )]
    ExceedsConsecutiveLimit { requested: i32, max: i32 },

    #[display(
        fmt = "at least {} days notice is required, request was made {} days ahead",
        required,
        given
    )]
    InsufficientNotice { required: i32, given: i64 },

    #[display(
        fmt = "request needs {} days but only {} remain",
        requested,
        remaining
    )]
    InsufficientBalance { requested: i32, remaining: i32 },

    #[display(fmt = "a medical certificate is required for this leave type")]
    MedicalCertificateRequired,

    #[display(fmt = "from_date {} is after to_date {}", from, to)]
    InvalidDateRange { from: NaiveDate, to: NaiveDate },

    #[display(fmt = "the requested range contains no working days")]
    NoWorkingDays,

    #[display(fmt = "no leave policy is configured for {}", leave_type)]
    NoPolicy { leave_type: LeaveType },
}

impl Violation {
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Display)]
pub enum WorkflowError {
    #[display(fmt = "{}", _0)]
    Validation(Violation),

    #[display(fmt = "step {} is not the current approval step", step_order)]
    NotCurrentStep { step_order: u32 },

    #[display(fmt = "step {} has already been decided", step_order)]
    AlreadyDecided { step_order: u32 },

    #[display(fmt = "an active {} policy already exists", leave_type)]
    PolicyConflict { leave_type: LeaveType },

    #[display(
        fmt = "assigning manager {} to employee {} would create a reporting cycle",
        manager_id,
        employee_id
    )]
    ManagerCycle { employee_id: u64, manager_id: u64 },

    #[display(fmt = "{} {} not found", entity, id)]
    NotFound { entity: &'static str, id: u64 },

    #[display(fmt = "{}", _0)]
    Forbidden(String),

    #[display(fmt = "configuration error: {}", _0)]
    Configuration(String),

    #[display(fmt = "persistence failure: {}", _0)]
    Persistence(String),
}

impl WorkflowError {
    pub fn not_found(entity: &'static str, id: u64) -> Self {
        WorkflowError::NotFound { entity, id }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        WorkflowError::Forbidden(message.into())
    }

    /// Caused by a race or stale client state; the caller may reload and retry.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            WorkflowError::NotCurrentStep { .. }
                | WorkflowError::AlreadyDecided { .. }
                | WorkflowError::PolicyConflict { .. }
                | WorkflowError::ManagerCycle { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Validation(v) => v.kind(),
            WorkflowError::NotCurrentStep { .. } => "not_current_step",
            WorkflowError::AlreadyDecided { .. } => "already_decided",
            WorkflowError::PolicyConflict { .. } => "policy_conflict",
            WorkflowError::ManagerCycle { .. } => "manager_cycle",
            WorkflowError::NotFound { .. } => "not_found",
            WorkflowError::Forbidden(_) => "forbidden",
            WorkflowError::Configuration(_) => "configuration",
            WorkflowError::Persistence(_) => "persistence",
        }
    }
}

impl std::error::Error for WorkflowError {}

impl From<Violation> for WorkflowError {
    fn from(violation: Violation) -> Self {
        WorkflowError::Validation(violation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_kind_is_snake_case() {
        let v = Violation::ExceedsConsecutiveLimit { requested: 6, max: 5 };
        assert_eq!(v.kind(), "exceeds_consecutive_limit");
        assert_eq!(
            v.to_string(),
            "request covers 6 working days but at most 5 consecutive days are allowed"
        );
    }

    #[test]
    fn state_conflicts_are_retryable() {
        assert!(WorkflowError::AlreadyDecided { step_order: 1 }.is_conflict());
        assert!(WorkflowError::NotCurrentStep { step_order: 2 }.is_conflict());
        assert!(!WorkflowError::Validation(Violation::NoWorkingDays).is_conflict());
        assert!(!WorkflowError::Persistence("gone".into()).is_conflict());
    }

    #[test]
    fn serializes_violation_with_kind_tag() {
        let v = Violation::InsufficientBalance { requested: 3, remaining: 1 };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["kind"], "insufficient_balance");
        assert_eq!(json["remaining"], 1);
    }
}
