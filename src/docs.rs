use crate::api::employee::{AssignManager, CreateEmployee, EmployeeListResponse, EmployeeQuery, SetStatus};
use crate::api::leave_balance::{BalanceListResponse, BalanceQuery, OpenBalance, YearQuery};
use crate::api::leave_policy::PolicyPayload;
use crate::api::leave_request::{CreateLeave, DecisionBody, LeaveFilter, LeaveListResponse};
use crate::auth::auth::AuthUser;
use crate::auth::handlers::LoginResponse;
use crate::model::{
    approval_step::{ApprovalStep, Decision},
    employee::{Employee, EmployeeStatus},
    holiday::Holiday,
    leave_balance::LeaveBalance,
    leave_policy::LeavePolicy,
    leave_request::{LeaveDetails, LeaveRequest, LeaveStatus, LeaveType},
    role::Role,
};
use crate::models::{LoginReqDto, UserReq};
use crate::workflow::service::DecisionOutcome;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leave Desk API",
        version = "1.0.0",
        description = r#"
## Leave Management Service

Employees apply for leave; each request walks through a **sequential approval chain**
(for example line manager, then HR). The request is approved only when every step
approves, and the employee's yearly balance is charged exactly once, at that moment.

### 🔹 Key Features
- **Leave requests**: submit, list, inspect, and approve or reject the current step
- **Leave policies**: annual limits, notice, consecutive-day caps, carry forward
- **Leave balances**: yearly ledger per employee and leave type
- **Employees**: profiles, reporting lines (cycle-checked) and retirement
- **Holidays**: excluded from working-day counts

### 🔐 Security
Endpoints under the API prefix require a **JWT Bearer** access token.
Roles: `employee`, `line_manager`, `hr`, `admin`.

### 📦 Errors
Failures carry a stable `error` kind, e.g. `insufficient_notice`, `not_current_step`.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::pending_approvals,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,

        crate::api::leave_policy::list_policies,
        crate::api::leave_policy::create_policy,
        crate::api::leave_policy::update_policy,

        crate::api::leave_balance::list_balances,
        crate::api::leave_balance::employee_balances,
        crate::api::leave_balance::open_balance,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::assign_manager,
        crate::api::employee::set_status,

        crate::api::holiday::list_holidays
    ),
    components(
        schemas(
            UserReq,
            LoginReqDto,
            LoginResponse,
            AuthUser,
            Role,
            LeaveType,
            LeaveStatus,
            LeaveRequest,
            LeaveDetails,
            ApprovalStep,
            Decision,
            DecisionBody,
            DecisionOutcome,
            CreateLeave,
            LeaveFilter,
            LeaveListResponse,
            LeavePolicy,
            PolicyPayload,
            LeaveBalance,
            OpenBalance,
            BalanceQuery,
            YearQuery,
            BalanceListResponse,
            Employee,
            EmployeeStatus,
            CreateEmployee,
            EmployeeQuery,
            EmployeeListResponse,
            AssignManager,
            SetStatus,
            Holiday
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login and token rotation"),
        (name = "Leave", description = "Leave requests and approvals"),
        (name = "Leave Policy", description = "Leave policy administration"),
        (name = "Leave Balance", description = "Yearly leave balances"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Holiday", description = "Public holidays"),
    )
)]
pub struct ApiDoc;
