use chrono::NaiveDate;

use crate::model::{
    leave_balance::LeaveBalance, leave_policy::LeavePolicy, leave_request::LeaveType,
};
use crate::workflow::error::{Violation, WorkflowError};

/// A leave request as submitted, before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaveDraft {
    pub employee_id: u64,
    pub leave_type: LeaveType,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub reason: String,
    pub days_count: i32,
    pub medical_certificate: bool,
}

/// Runs the policy checks in order and stops at the first failure.
/// A missing balance row is treated as zero remaining days.
pub fn validate(
    draft: &LeaveDraft,
    policy: &LeavePolicy,
    balance: Option<&LeaveBalance>,
    today: NaiveDate,
) -> Result<(), Violation> {
    if !policy.is_active {
        return Err(Violation::PolicyInactive {
            leave_type: policy.leave_type,
        });
    }

    if draft.days_count > policy.max_consecutive_days {
        return Err(Violation::ExceedsConsecutiveLimit {
            requested: draft.days_count,
            max: policy.max_consecutive_days,
        });
    }

    let notice = (draft.from_date - today).num_days();
    if notice < i64::from(policy.min_days_notice) {
        return Err(Violation::InsufficientNotice {
            required: policy.min_days_notice,
            given: notice,
        });
    }

    match balance {
        Some(balance) => balance.reserve(draft.days_count)?,
        None => {
            return Err(Violation::InsufficientBalance {
                requested: draft.days_count,
                remaining: 0,
            });
        }
    }

    if policy.requires_medical_certificate && !draft.medical_certificate {
        return Err(Violation::MedicalCertificateRequired);
    }

    Ok(())
}

/// Total days for a new year's balance, carrying forward what the
/// policy allows from the previous year.
pub fn opening_total(policy: &LeavePolicy, previous: Option<&LeaveBalance>) -> i32 {
    let carried = match previous {
        Some(prev) if policy.carry_forward_allowed => match policy.carry_forward_limit {
            Some(limit) => prev.remaining_days.min(limit),
            None => prev.remaining_days,
        },
        _ => 0,
    };
    policy.annual_limit + carried.max(0)
}

/// Rejects a write that would leave two active policies for one leave type.
/// `candidate_id` is `None` for a policy that is not stored yet.
pub fn ensure_single_active(
    existing: &[LeavePolicy],
    leave_type: LeaveType,
    candidate_id: Option<u64>,
) -> Result<(), WorkflowError> {
    let clash = existing
        .iter()
        .any(|p| p.is_active && p.leave_type == leave_type && Some(p.id) != candidate_id);
    if clash {
        return Err(WorkflowError::PolicyConflict { leave_type });
    }
    Ok(())
}
