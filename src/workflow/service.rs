use std::collections::HashSet;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::model::{
    approval_step::{ApprovalStep, Decision},
    leave_balance::{LeaveBalance, LedgerKey},
    leave_request::{LeaveDetails, LeaveRequest, LeaveType},
    role::Role,
};
use crate::workflow::{
    access::{Actor, Operation},
    calendar::business_days,
    chain::{ApprovalChain, LedgerEffect},
    error::{Violation, WorkflowError},
    policy::{self, LeaveDraft},
    routing::ApprovalRouting,
    store::WorkflowStore,
};

/// A leave application as entered by the employee.
#[derive(Debug, Clone)]
pub struct LeaveApplication {
    pub leave_type: LeaveType,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub reason: String,
    pub medical_certificate: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DecisionOutcome {
    pub request: LeaveRequest,
    pub approvals: Vec<ApprovalStep>,
    /// The ledger row after the decision, when one was charged
    #[schema(nullable = true)]
    pub balance: Option<LeaveBalance>,
}

/// Entry points of the leave workflow: submission and approver decisions.
pub struct WorkflowService<S, R> {
    store: S,
    routing: R,
}

impl<S, R> WorkflowService<S, R>
where
    S: WorkflowStore,
    R: ApprovalRouting,
{
    pub fn new(store: S, routing: R) -> Self {
        Self { store, routing }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[instrument(
        name = "leave_submit",
        skip_all,
        fields(user_id = actor.user_id, leave_type = %application.leave_type)
    )]
    pub async fn submit(
        &self,
        actor: &Actor,
        application: LeaveApplication,
        today: NaiveDate,
    ) -> Result<LeaveDetails, WorkflowError> {
        actor.require(Operation::SubmitLeave)?;
        let employee_id = actor.employee()?;

        let LeaveApplication {
            leave_type,
            from_date,
            to_date,
            reason,
            medical_certificate,
        } = application;

        if from_date > to_date {
            return Err(Violation::InvalidDateRange {
                from: from_date,
                to: to_date,
            }
            .into());
        }

        let employee = self
            .store
            .employee(employee_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("employee", employee_id))?;
        if !employee.is_active() {
            return Err(WorkflowError::forbidden("Inactive employees cannot apply for leave"));
        }

        let holidays: HashSet<NaiveDate> = self
            .store
            .holidays_between(from_date, to_date)
            .await?
            .into_iter()
            .collect();
        let days_count = business_days(from_date, to_date, &holidays);
        if days_count == 0 {
            return Err(Violation::NoWorkingDays.into());
        }
        debug!(days_count, holidays = holidays.len(), "Computed working days");

        let policy = self
            .store
            .policy_for(leave_type)
            .await?
            .ok_or(Violation::NoPolicy { leave_type })?;

        let draft = LeaveDraft {
            employee_id,
            leave_type,
            from_date,
            to_date,
            reason,
            days_count,
            medical_certificate,
        };
        let key = LedgerKey {
            employee_id,
            leave_type,
            year: from_date.year(),
        };
        let balance = self.store.balance(&key).await?;

        if let Err(violation) = policy::validate(&draft, &policy, balance.as_ref(), today) {
            info!(kind = violation.kind(), "Leave request rejected by policy");
            return Err(violation.into());
        }

        let roles = self.routing.roles_for(leave_type, employee.department_id);
        let chain = ApprovalChain::build(&roles)?;
        let request = self.store.insert_request(&draft, &chain).await?;

        info!(
            leave_id = request.id,
            days_count,
            steps = chain.steps().len(),
            "Leave request submitted"
        );

        Ok(LeaveDetails {
            request,
            approvals: chain.into_steps(),
        })
    }

    #[instrument(
        name = "leave_decide",
        skip_all,
        fields(user_id = actor.user_id, leave_id = request_id, step_order = step_order, decision = ?decision)
    )]
    pub async fn decide(
        &self,
        actor: &Actor,
        request_id: u64,
        step_order: u32,
        decision: Decision,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, WorkflowError> {
        actor.require(Operation::DecideLeave)?;
        let approver_id = actor.employee()?;

        let result = self
            .store
            .update_locked(request_id, |record| {
                if record.request.employee_id == approver_id {
                    return Err(WorkflowError::forbidden(
                        "Approvers cannot decide their own leave request",
                    ));
                }

                let step_role = record
                    .chain
                    .step(step_order)
                    .map(|s| s.approver_role)
                    .ok_or_else(|| {
                        WorkflowError::not_found("approval step", u64::from(step_order))
                    })?;
                if !actor.may_act_on(step_role, record.requester_manager_id) {
                    return Err(WorkflowError::forbidden(format!(
                        "Step {} is reserved for {}",
                        step_order, step_role
                    )));
                }

                let transition = record
                    .chain
                    .decide(step_order, decision, approver_id, comment, now)?;
                record.request.status = transition.status;
                record.request.updated_at = now;

                let charged = if transition.ledger == LedgerEffect::Commit {
                    let days = record.request.days_count;
                    match record.balance.as_mut() {
                        Some(balance) => balance.commit(days)?,
                        None => {
                            return Err(Violation::InsufficientBalance {
                                requested: days,
                                remaining: 0,
                            }
                            .into());
                        }
                    }
                    record.balance.clone()
                } else {
                    None
                };

                Ok(DecisionOutcome {
                    request: record.request.clone(),
                    approvals: record.chain.steps().to_vec(),
                    balance: charged,
                })
            })
            .await;

        match &result {
            Ok(outcome) => info!(status = %outcome.request.status, "Leave decision applied"),
            Err(e) if e.is_conflict() => warn!(error = %e, "Leave decision lost a race"),
            Err(e) => info!(error = %e, "Leave decision refused"),
        }
        result
    }

    /// Requests waiting on the caller. HR also sees line manager steps of
    /// requesters who have no manager.
    pub async fn pending_for(&self, actor: &Actor) -> Result<Vec<LeaveRequest>, WorkflowError> {
        actor.require(Operation::DecideLeave)?;
        let mut inbox = self.store.pending_for_role(actor.role).await?;
        let manager_steps = match actor.role {
            Role::LineManager => std::mem::take(&mut inbox),
            Role::Hr => self.store.pending_for_role(Role::LineManager).await?,
            _ => return Ok(inbox),
        };

        for request in manager_steps {
            if actor.employee_id == Some(request.employee_id) {
                continue;
            }
            let manager = self
                .store
                .employee(request.employee_id)
                .await?
                .and_then(|e| e.manager_id);
            if actor.may_act_on(Role::LineManager, manager) {
                inbox.push(request);
            }
        }
        inbox.sort_by_key(|r| r.id);
        Ok(inbox)
    }

    /// A request with its steps, visible to its owner, approvers and HR.
    pub async fn details(&self, actor: &Actor, request_id: u64) -> Result<LeaveDetails, WorkflowError> {
        let (request, chain) = self
            .store
            .load(request_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("leave request", request_id))?;

        let owner = actor.employee_id == Some(request.employee_id);
        if !owner && !actor.can(Operation::ViewAllLeave) && !actor.can(Operation::DecideLeave) {
            return Err(WorkflowError::forbidden("Not allowed to view this leave request"));
        }

        Ok(LeaveDetails {
            request,
            approvals: chain.into_steps(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use chrono::Duration;
    use futures::executor::block_on;

    use super::*;
    use crate::model::leave_request::LeaveStatus;
    use crate::workflow::memory::MemoryStore;
    use crate::workflow::routing::ConfiguredRouting;

    const EMPLOYEE: u64 = 4;
    const MANAGER: u64 = 3;
    const HR: u64 = 2;
    const OTHER_MANAGER: u64 = 7;
    const UNMANAGED: u64 = 6;

    fn today() -> NaiveDate {
        // a Monday
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn actor(role: Role, employee_id: u64) -> Actor {
        Actor {
            user_id: employee_id * 10,
            role,
            employee_id: Some(employee_id),
        }
    }

    fn service() -> WorkflowService<MemoryStore, ConfiguredRouting> {
        let store = MemoryStore::seeded(today());
        let routing = ConfiguredRouting::new(vec![Role::LineManager, Role::Hr])
            .with_type(LeaveType::Sick, vec![Role::LineManager]);
        WorkflowService::new(store, routing)
    }

    fn application(from_offset: i64, to_offset: i64) -> LeaveApplication {
        LeaveApplication {
            leave_type: LeaveType::Casual,
            from_date: today() + Duration::days(from_offset),
            to_date: today() + Duration::days(to_offset),
            reason: "Family vacation".to_string(),
            medical_certificate: false,
        }
    }

    fn casual_key() -> LedgerKey {
        LedgerKey {
            employee_id: EMPLOYEE,
            leave_type: LeaveType::Casual,
            year: 2026,
        }
    }

    fn submit(svc: &WorkflowService<MemoryStore, ConfiguredRouting>) -> LeaveDetails {
        // Thu 29th .. Mon 2nd: three working days
        block_on(svc.submit(&actor(Role::Employee, EMPLOYEE), application(10, 14), today())).unwrap()
    }

    fn decide(
        svc: &WorkflowService<MemoryStore, ConfiguredRouting>,
        who: &Actor,
        id: u64,
        step: u32,
        decision: Decision,
    ) -> Result<DecisionOutcome, WorkflowError> {
        block_on(svc.decide(who, id, step, decision, None, Utc::now()))
    }

    #[test]
    fn submit_persists_pending_request_with_chain() {
        let svc = service();
        let details = submit(&svc);

        assert_eq!(details.request.status, LeaveStatus::Pending);
        assert_eq!(details.request.days_count, 3);
        assert_eq!(details.approvals.len(), 2);
        assert!(details.approvals[0].is_current);

        let stored = block_on(svc.store().load(details.request.id)).unwrap().unwrap();
        assert_eq!(stored.0, details.request);
        assert_eq!(stored.1.steps(), details.approvals.as_slice());
        // pending requests do not touch the ledger
        assert_eq!(svc.store().balance_of(&casual_key()).unwrap().used_days, 2);
    }

    #[test]
    fn policy_violation_persists_nothing() {
        let svc = service();
        // Mon 26th .. Mon 2nd: six working days against a limit of five
        let err = block_on(svc.submit(&actor(Role::Employee, EMPLOYEE), application(7, 14), today()))
            .unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::Validation(Violation::ExceedsConsecutiveLimit { requested: 6, max: 5 })
        ));
        assert_eq!(svc.store().request_count(), 0);
    }

    #[test]
    fn submit_prechecks_range_and_working_days() {
        let svc = service();
        let emp = actor(Role::Employee, EMPLOYEE);

        let inverted = block_on(svc.submit(&emp, application(12, 10), today())).unwrap_err();
        assert!(matches!(
            inverted,
            WorkflowError::Validation(Violation::InvalidDateRange { .. })
        ));

        // Sat 24th .. Sun 25th
        let weekend = block_on(svc.submit(&emp, application(5, 6), today())).unwrap_err();
        assert!(matches!(weekend, WorkflowError::Validation(Violation::NoWorkingDays)));
        assert_eq!(svc.store().request_count(), 0);
    }

    #[test]
    fn very_long_range_hits_consecutive_limit() {
        let svc = service();
        // roughly twenty thousand years
        let err = block_on(svc.submit(&actor(Role::Employee, EMPLOYEE), application(10, 7_300_000), today()))
            .unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::Validation(Violation::ExceedsConsecutiveLimit { max: 5, .. })
        ));
        assert_eq!(svc.store().request_count(), 0);
    }

    #[test]
    fn holidays_are_not_counted() {
        let svc = service();
        svc.store().add_holiday(today() + Duration::days(11));

        let details = submit(&svc);

        assert_eq!(details.request.days_count, 2);
    }

    #[test]
    fn inactive_or_missing_policy_is_reported() {
        let svc = service();
        let emp = actor(Role::Employee, EMPLOYEE);

        let mut app = application(10, 11);
        app.leave_type = LeaveType::Paternity;
        assert!(matches!(
            block_on(svc.submit(&emp, app, today())),
            Err(WorkflowError::Validation(Violation::NoPolicy { .. }))
        ));

        let mut app = application(10, 11);
        app.leave_type = LeaveType::Personal;
        assert!(matches!(
            block_on(svc.submit(&emp, app, today())),
            Err(WorkflowError::Validation(Violation::PolicyInactive { .. }))
        ));
    }

    #[test]
    fn inactive_employee_cannot_submit() {
        let svc = service();
        svc.store().retire(EMPLOYEE);
        let err = block_on(svc.submit(&actor(Role::Employee, EMPLOYEE), application(10, 14), today()))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));
    }

    #[test]
    fn sick_leave_uses_its_own_chain() {
        let svc = service();
        let mut app = application(0, 1);
        app.leave_type = LeaveType::Sick;
        app.medical_certificate = true;

        let details = block_on(svc.submit(&actor(Role::Employee, EMPLOYEE), app, today())).unwrap();

        assert_eq!(details.approvals.len(), 1);
        assert_eq!(details.approvals[0].approver_role, Role::LineManager);
    }

    #[test]
    fn two_step_approval_commits_ledger() {
        let svc = service();
        let id = submit(&svc).request.id;

        let first = decide(&svc, &actor(Role::LineManager, MANAGER), id, 1, Decision::Approve).unwrap();
        assert_eq!(first.request.status, LeaveStatus::Pending);
        assert!(first.approvals[1].is_current);
        assert!(first.balance.is_none());
        assert_eq!(svc.store().balance_of(&casual_key()).unwrap().used_days, 2);

        let second = decide(&svc, &actor(Role::Hr, HR), id, 2, Decision::Approve).unwrap();
        assert_eq!(second.request.status, LeaveStatus::Approved);

        let balance = svc.store().balance_of(&casual_key()).unwrap();
        assert_eq!(balance.used_days, 5);
        assert_eq!(balance.remaining_days, 7);
        assert!(balance.is_consistent());
        assert_eq!(second.balance, Some(balance));
    }

    #[test]
    fn rejection_at_first_step_is_final() {
        let svc = service();
        let id = submit(&svc).request.id;

        let outcome = decide(&svc, &actor(Role::LineManager, MANAGER), id, 1, Decision::Reject).unwrap();
        assert_eq!(outcome.request.status, LeaveStatus::Rejected);
        assert!(!outcome.approvals[1].is_current);
        assert_eq!(outcome.approvals[1].status, LeaveStatus::Pending);

        let err = decide(&svc, &actor(Role::Hr, HR), id, 2, Decision::Approve).unwrap_err();
        assert!(matches!(err, WorkflowError::NotCurrentStep { step_order: 2 }));
        assert_eq!(svc.store().balance_of(&casual_key()).unwrap().used_days, 2);
    }

    #[test]
    fn conflicting_decisions_are_reported() {
        let svc = service();
        let id = submit(&svc).request.id;
        let manager = actor(Role::LineManager, MANAGER);

        let early = decide(&svc, &actor(Role::Hr, HR), id, 2, Decision::Approve).unwrap_err();
        assert!(matches!(early, WorkflowError::NotCurrentStep { step_order: 2 }));

        decide(&svc, &manager, id, 1, Decision::Approve).unwrap();
        let again = decide(&svc, &manager, id, 1, Decision::Approve).unwrap_err();
        assert!(matches!(again, WorkflowError::AlreadyDecided { step_order: 1 }));
    }

    #[test]
    fn approvers_are_checked_against_step_role() {
        let svc = service();
        let id = submit(&svc).request.id;

        let hr_on_manager_step = decide(&svc, &actor(Role::Hr, HR), id, 1, Decision::Approve).unwrap_err();
        assert!(matches!(hr_on_manager_step, WorkflowError::Forbidden(_)));

        let wrong_manager =
            decide(&svc, &actor(Role::LineManager, OTHER_MANAGER), id, 1, Decision::Approve).unwrap_err();
        assert!(matches!(wrong_manager, WorkflowError::Forbidden(_)));

        let employee = decide(&svc, &actor(Role::Employee, 5), id, 1, Decision::Approve).unwrap_err();
        assert!(matches!(employee, WorkflowError::Forbidden(_)));

        let unknown = decide(&svc, &actor(Role::LineManager, MANAGER), 999, 1, Decision::Approve).unwrap_err();
        assert!(matches!(unknown, WorkflowError::NotFound { .. }));

        // nothing above changed the chain
        let (request, chain) = block_on(svc.store().load(id)).unwrap().unwrap();
        assert_eq!(request.status, LeaveStatus::Pending);
        assert_eq!(chain.current().map(|s| s.step_order), Some(1));
    }

    #[test]
    fn failed_ledger_commit_rolls_back_the_decision() {
        let svc = service();
        let id = submit(&svc).request.id;
        decide(&svc, &actor(Role::LineManager, MANAGER), id, 1, Decision::Approve).unwrap();
        // balance drained after submission
        svc.store().set_remaining(&casual_key(), 1);

        let err = decide(&svc, &actor(Role::Hr, HR), id, 2, Decision::Approve).unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::Validation(Violation::InsufficientBalance { requested: 3, remaining: 1 })
        ));
        let (request, chain) = block_on(svc.store().load(id)).unwrap().unwrap();
        assert_eq!(request.status, LeaveStatus::Pending);
        assert_eq!(chain.current().map(|s| s.step_order), Some(2));
        assert_eq!(chain.step(2).unwrap().status, LeaveStatus::Pending);
        assert!(svc.store().balance_of(&casual_key()).unwrap().is_consistent());
    }

    #[test]
    fn pending_inbox_follows_current_step() {
        let svc = service();
        let id = submit(&svc).request.id;
        let manager = actor(Role::LineManager, MANAGER);
        let hr = actor(Role::Hr, HR);

        assert_eq!(block_on(svc.pending_for(&manager)).unwrap().len(), 1);
        assert!(block_on(svc.pending_for(&actor(Role::LineManager, OTHER_MANAGER))).unwrap().is_empty());
        assert!(block_on(svc.pending_for(&hr)).unwrap().is_empty());

        decide(&svc, &manager, id, 1, Decision::Approve).unwrap();

        assert!(block_on(svc.pending_for(&manager)).unwrap().is_empty());
        assert_eq!(block_on(svc.pending_for(&hr)).unwrap()[0].id, id);
    }

    #[test]
    fn manager_step_of_unmanaged_requester_goes_to_hr() {
        let svc = service();
        let id = block_on(svc.submit(&actor(Role::Employee, UNMANAGED), application(10, 14), today()))
            .unwrap()
            .request
            .id;
        let manager = actor(Role::LineManager, MANAGER);
        let hr = actor(Role::Hr, HR);

        assert!(block_on(svc.pending_for(&manager)).unwrap().is_empty());
        assert!(block_on(svc.pending_for(&actor(Role::LineManager, OTHER_MANAGER))).unwrap().is_empty());
        let inbox: Vec<u64> = block_on(svc.pending_for(&hr)).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(inbox, vec![id]);

        let err = decide(&svc, &manager, id, 1, Decision::Approve).unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));

        let first = decide(&svc, &hr, id, 1, Decision::Approve).unwrap();
        assert_eq!(first.request.status, LeaveStatus::Pending);
        assert_eq!(first.approvals[0].approver_id, Some(HR));
    }

    #[test]
    fn details_visible_to_owner_and_approvers_only() {
        let svc = service();
        let id = submit(&svc).request.id;

        assert!(block_on(svc.details(&actor(Role::Employee, EMPLOYEE), id)).is_ok());
        assert!(block_on(svc.details(&actor(Role::Hr, HR), id)).is_ok());
        assert!(matches!(
            block_on(svc.details(&actor(Role::Employee, 5), id)),
            Err(WorkflowError::Forbidden(_))
        ));
    }

    #[test]
    fn concurrent_decisions_on_one_step_serialize() {
        let svc = Arc::new(service());
        let id = submit(&svc).request.id;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let svc = Arc::clone(&svc);
                thread::spawn(move || {
                    let decision = if i % 2 == 0 { Decision::Approve } else { Decision::Reject };
                    decide(&svc, &actor(Role::LineManager, MANAGER), id, 1, decision)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(err.is_conflict(), "unexpected error: {err}");
        }
        let (_, chain) = block_on(svc.store().load(id)).unwrap().unwrap();
        assert_eq!(chain.step(1).unwrap().approver_id, Some(MANAGER));
        assert!(chain.current().map_or(true, |s| s.step_order == 2));
    }
}
