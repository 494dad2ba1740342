use chrono::{DateTime, Utc};

use crate::model::{
    approval_step::{ApprovalStep, Decision},
    leave_request::LeaveStatus,
    role::Role,
};
use crate::workflow::error::WorkflowError;

/// What the ledger must do after a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEffect {
    None,
    /// The request reached `approved`; charge its days.
    Commit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub step_order: u32,
    pub status: LeaveStatus,
    pub ledger: LedgerEffect,
}

/// The ordered approval steps of one leave request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalChain {
    steps: Vec<ApprovalStep>,
}

/// Request status as a function of its step statuses.
pub fn derive_status(steps: &[ApprovalStep]) -> LeaveStatus {
    if steps.iter().any(|s| s.status == LeaveStatus::Rejected) {
        LeaveStatus::Rejected
    } else if !steps.is_empty() && steps.iter().all(|s| s.status == LeaveStatus::Approved) {
        LeaveStatus::Approved
    } else {
        LeaveStatus::Pending
    }
}

/// The lowest-order pending step, unless the chain is already terminal.
pub fn derive_current(steps: &[ApprovalStep]) -> Option<u32> {
    if derive_status(steps).is_terminal() {
        return None;
    }
    steps
        .iter()
        .filter(|s| s.status == LeaveStatus::Pending)
        .map(|s| s.step_order)
        .min()
}

impl ApprovalChain {
    pub fn build(roles: &[Role]) -> Result<Self, WorkflowError> {
        if roles.is_empty() {
            return Err(WorkflowError::Configuration(
                "approval role sequence is empty".to_string(),
            ));
        }
        if let Some(role) = roles.iter().find(|r| !r.is_approver()) {
            return Err(WorkflowError::Configuration(format!(
                "role {} cannot approve leave",
                role
            )));
        }

        let steps = roles
            .iter()
            .enumerate()
            .map(|(i, role)| ApprovalStep::new(i as u32 + 1, *role))
            .collect();
        Ok(Self { steps })
    }

    /// Rebuilds a chain from stored steps, checking ordering and that the
    /// stored current flag agrees with the derived one.
    pub fn from_steps(mut steps: Vec<ApprovalStep>) -> Result<Self, WorkflowError> {
        steps.sort_by_key(|s| s.step_order);

        if steps.is_empty() {
            return Err(WorkflowError::Persistence(
                "leave request has no approval steps".to_string(),
            ));
        }
        for (i, step) in steps.iter().enumerate() {
            if step.step_order != i as u32 + 1 {
                return Err(WorkflowError::Persistence(format!(
                    "approval steps are not contiguous at step {}",
                    step.step_order
                )));
            }
        }

        let chain = Self { steps };
        if chain.stored_current() != derive_current(&chain.steps) {
            return Err(WorkflowError::Persistence(
                "stored current step disagrees with step statuses".to_string(),
            ));
        }
        Ok(chain)
    }

    pub fn steps(&self) -> &[ApprovalStep] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<ApprovalStep> {
        self.steps
    }

    pub fn step(&self, step_order: u32) -> Option<&ApprovalStep> {
        self.steps.iter().find(|s| s.step_order == step_order)
    }

    pub fn current(&self) -> Option<&ApprovalStep> {
        self.steps.iter().find(|s| s.is_current)
    }

    pub fn status(&self) -> LeaveStatus {
        derive_status(&self.steps)
    }

    fn stored_current(&self) -> Option<u32> {
        let mut current = self.steps.iter().filter(|s| s.is_current);
        match (current.next(), current.next()) {
            (Some(step), None) => Some(step.step_order),
            // zero or several flagged steps never agree with the derived value
            (None, _) => None,
            (Some(_), Some(_)) => Some(0),
        }
    }

    /// Applies one approver decision. The chain is left untouched on error.
    pub fn decide(
        &mut self,
        step_order: u32,
        decision: Decision,
        approver_id: u64,
        comment: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Transition, WorkflowError> {
        let idx = self
            .steps
            .iter()
            .position(|s| s.step_order == step_order)
            .ok_or_else(|| WorkflowError::not_found("approval step", u64::from(step_order)))?;

        if self.steps[idx].status.is_terminal() {
            return Err(WorkflowError::AlreadyDecided { step_order });
        }
        if !self.steps[idx].is_current {
            return Err(WorkflowError::NotCurrentStep { step_order });
        }

        let step = &mut self.steps[idx];
        step.approver_id = Some(approver_id);
        step.comments = comment;
        step.approved_at = Some(at);
        step.is_current = false;

        let ledger = match decision {
            Decision::Reject => {
                step.status = LeaveStatus::Rejected;
                LedgerEffect::None
            }
            Decision::Approve => {
                step.status = LeaveStatus::Approved;
                match self.steps.get_mut(idx + 1) {
                    Some(next) => {
                        next.is_current = true;
                        LedgerEffect::None
                    }
                    None => LedgerEffect::Commit,
                }
            }
        };

        Ok(Transition {
            step_order,
            status: self.status(),
            ledger,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_step() -> ApprovalChain {
        ApprovalChain::build(&[Role::LineManager, Role::Hr]).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn assert_current_flag_matches_derived(chain: &ApprovalChain) {
        let flagged: Vec<u32> = chain
            .steps()
            .iter()
            .filter(|s| s.is_current)
            .map(|s| s.step_order)
            .collect();
        assert_eq!(flagged.first().copied(), derive_current(chain.steps()));
        assert!(flagged.len() <= 1);
    }

    #[test]
    fn build_marks_only_first_step_current() {
        let chain = two_step();
        let steps = chain.steps();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step_order, 1);
        assert_eq!(steps[0].approver_role, Role::LineManager);
        assert!(steps[0].is_current);
        assert_eq!(steps[1].step_order, 2);
        assert!(!steps[1].is_current);
        assert!(steps.iter().all(|s| s.status == LeaveStatus::Pending));
        assert_eq!(chain.status(), LeaveStatus::Pending);
    }

    #[test]
    fn build_rejects_empty_or_non_approver_roles() {
        assert!(matches!(
            ApprovalChain::build(&[]),
            Err(WorkflowError::Configuration(_))
        ));
        assert!(matches!(
            ApprovalChain::build(&[Role::LineManager, Role::Employee]),
            Err(WorkflowError::Configuration(_))
        ));
    }

    #[test]
    fn approving_all_steps_in_order_approves_request() {
        let mut chain = two_step();

        let first = chain.decide(1, Decision::Approve, 3, None, now()).unwrap();
        assert_eq!(first.status, LeaveStatus::Pending);
        assert_eq!(first.ledger, LedgerEffect::None);
        assert_eq!(chain.current().map(|s| s.step_order), Some(2));
        assert_eq!(chain.step(1).unwrap().approver_id, Some(3));
        assert!(chain.step(1).unwrap().approved_at.is_some());
        assert_current_flag_matches_derived(&chain);

        let second = chain
            .decide(2, Decision::Approve, 2, Some("enjoy".into()), now())
            .unwrap();
        assert_eq!(second.status, LeaveStatus::Approved);
        assert_eq!(second.ledger, LedgerEffect::Commit);
        assert!(chain.current().is_none());
        assert_current_flag_matches_derived(&chain);
    }

    #[test]
    fn rejection_freezes_remaining_steps() {
        let mut chain = two_step();

        let t = chain
            .decide(1, Decision::Reject, 3, Some("deadline".into()), now())
            .unwrap();
        assert_eq!(t.status, LeaveStatus::Rejected);
        assert_eq!(t.ledger, LedgerEffect::None);
        assert!(chain.current().is_none());

        let frozen = chain.step(2).unwrap();
        assert_eq!(frozen.status, LeaveStatus::Pending);
        assert!(!frozen.is_current);
        assert!(matches!(
            chain.decide(2, Decision::Approve, 2, None, now()),
            Err(WorkflowError::NotCurrentStep { step_order: 2 })
        ));
        assert_current_flag_matches_derived(&chain);
    }

    #[test]
    fn rejection_at_last_step_has_no_ledger_effect() {
        let mut chain = ApprovalChain::build(&[Role::LineManager, Role::Hr, Role::Admin]).unwrap();
        chain.decide(1, Decision::Approve, 3, None, now()).unwrap();
        chain.decide(2, Decision::Approve, 2, None, now()).unwrap();

        let t = chain.decide(3, Decision::Reject, 1, None, now()).unwrap();

        assert_eq!(t.status, LeaveStatus::Rejected);
        assert_eq!(t.ledger, LedgerEffect::None);
    }

    #[test]
    fn deciding_out_of_turn_fails() {
        let mut chain = two_step();
        let before = chain.clone();

        assert!(matches!(
            chain.decide(2, Decision::Approve, 2, None, now()),
            Err(WorkflowError::NotCurrentStep { step_order: 2 })
        ));
        assert_eq!(chain, before);
    }

    #[test]
    fn deciding_twice_fails_with_already_decided() {
        let mut chain = two_step();
        chain.decide(1, Decision::Approve, 3, None, now()).unwrap();
        let before = chain.clone();

        assert!(matches!(
            chain.decide(1, Decision::Approve, 3, None, now()),
            Err(WorkflowError::AlreadyDecided { step_order: 1 })
        ));
        assert!(matches!(
            chain.decide(1, Decision::Reject, 3, None, now()),
            Err(WorkflowError::AlreadyDecided { step_order: 1 })
        ));
        assert_eq!(chain, before);
    }

    #[test]
    fn unknown_step_is_not_found() {
        let mut chain = two_step();
        assert!(matches!(
            chain.decide(7, Decision::Approve, 3, None, now()),
            Err(WorkflowError::NotFound { .. })
        ));
    }

    #[test]
    fn n_step_chain_approves_only_after_every_step() {
        let roles = [Role::LineManager, Role::Hr, Role::Admin, Role::Hr];
        let mut chain = ApprovalChain::build(&roles).unwrap();

        for order in 1..=roles.len() as u32 {
            assert_eq!(chain.status(), LeaveStatus::Pending);
            let t = chain.decide(order, Decision::Approve, 9, None, now()).unwrap();
            assert_current_flag_matches_derived(&chain);
            if order < roles.len() as u32 {
                assert_eq!(t.ledger, LedgerEffect::None);
            } else {
                assert_eq!(t.status, LeaveStatus::Approved);
                assert_eq!(t.ledger, LedgerEffect::Commit);
            }
        }
    }

    #[test]
    fn from_steps_roundtrips_a_live_chain() {
        let mut chain = two_step();
        chain.decide(1, Decision::Approve, 3, None, now()).unwrap();

        let mut stored = chain.clone().into_steps();
        stored.reverse();
        let restored = ApprovalChain::from_steps(stored).unwrap();

        assert_eq!(restored, chain);
    }

    #[test]
    fn from_steps_rejects_divergent_current_flag() {
        let mut steps = two_step().into_steps();
        steps[0].is_current = false;
        steps[1].is_current = true;
        assert!(ApprovalChain::from_steps(steps).is_err());

        let mut gap = two_step().into_steps();
        gap[1].step_order = 3;
        assert!(ApprovalChain::from_steps(gap).is_err());
    }
}
