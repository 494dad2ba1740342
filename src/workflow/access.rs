use crate::model::role::Role;
use crate::workflow::error::WorkflowError;

/// The calling identity, as resolved by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: u64,
    pub role: Role,
    /// Present only if the user is linked to an employee record
    pub employee_id: Option<u64>,
}

/// Operations guarded by role. Each declares the roles allowed to call it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SubmitLeave,
    DecideLeave,
    ViewAllLeave,
    ManagePolicies,
    ManageBalances,
    ManageEmployees,
}

impl Operation {
    pub fn permitted_roles(self) -> &'static [Role] {
        use Role::*;
        match self {
            Operation::SubmitLeave => &[Employee, LineManager, Hr, Admin],
            Operation::DecideLeave => &[LineManager, Hr, Admin],
            Operation::ViewAllLeave => &[Hr, Admin],
            Operation::ManagePolicies => &[Hr, Admin],
            Operation::ManageBalances => &[Hr, Admin],
            Operation::ManageEmployees => &[Hr, Admin],
        }
    }
}

impl Actor {
    pub fn can(&self, op: Operation) -> bool {
        op.permitted_roles().contains(&self.role)
    }

    pub fn require(&self, op: Operation) -> Result<(), WorkflowError> {
        if self.can(op) {
            Ok(())
        } else {
            Err(WorkflowError::forbidden(format!(
                "role {} may not perform {:?}",
                self.role, op
            )))
        }
    }

    pub fn employee(&self) -> Result<u64, WorkflowError> {
        self.employee_id
            .ok_or_else(|| WorkflowError::forbidden("No employee profile"))
    }

    /// Whether this actor may act on a step addressed to `step_role`.
    /// A line manager step belongs to the requester's own manager; when the
    /// requester has none it falls to HR. Admins may act on any step.
    pub fn may_act_on(&self, step_role: Role, requester_manager_id: Option<u64>) -> bool {
        match (self.role, step_role) {
            (Role::Admin, _) => true,
            (Role::LineManager, Role::LineManager) => {
                requester_manager_id.is_some() && self.employee_id == requester_manager_id
            }
            (Role::Hr, Role::LineManager) => requester_manager_id.is_none(),
            (mine, wanted) => mine == wanted,
        }
    }
}
