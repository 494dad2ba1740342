pub mod approval_step;
pub mod employee;
pub mod holiday;
pub mod leave_balance;
pub mod leave_policy;
pub mod leave_request;
pub mod role;
pub mod user;
