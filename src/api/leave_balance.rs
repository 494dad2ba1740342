use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::{FilterValue, LeaveService, bind_as, bind_scalar, page_bounds, where_clause},
    auth::auth::AuthUser,
    db::{
        is_foreign_key_violation, is_unique_violation,
        rows::{BALANCE_COLUMNS, BalanceRow, convert_all},
    },
    model::{
        leave_balance::{LeaveBalance, LedgerKey},
        leave_request::LeaveType,
    },
    workflow::{
        access::Operation,
        error::{Violation, WorkflowError},
        policy::opening_total,
        store::WorkflowStore,
    },
};

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct BalanceQuery {
    /// Filter by employee ID (HR/Admin only; others always see their own)
    #[schema(example = 4)]
    pub employee_id: Option<u64>,
    #[schema(example = "casual")]
    pub leave_type: Option<LeaveType>,
    #[schema(example = 2026)]
    pub year: Option<i32>,
    #[schema(example = 1)]
    pub page: Option<u32>,
    #[schema(example = 10)]
    pub per_page: Option<u32>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct YearQuery {
    /// Defaults to the current year
    #[schema(example = 2026)]
    pub year: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct BalanceListResponse {
    pub data: Vec<LeaveBalance>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct OpenBalance {
    #[schema(example = 4)]
    pub employee_id: u64,
    #[schema(example = "casual")]
    pub leave_type: LeaveType,
    #[schema(example = 2027)]
    pub year: i32,
    /// Overrides the policy's annual limit plus carry forward
    #[schema(example = 15, nullable = true)]
    pub total_days: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/api/v1/leave-balances",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Paginated balances", body = BalanceListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Balance"
)]
pub async fn list_balances(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<BalanceQuery>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor();
    let (page, per_page, offset) = page_bounds(query.page, query.per_page);

    let mut conditions = Vec::new();
    let mut args: Vec<FilterValue> = Vec::new();

    let employee_filter = if actor.can(Operation::ManageBalances) {
        query.employee_id
    } else {
        Some(actor.employee()?)
    };
    if let Some(emp_id) = employee_filter {
        conditions.push("employee_id = ?");
        args.push(FilterValue::U64(emp_id));
    }
    if let Some(leave_type) = query.leave_type {
        conditions.push("leave_type = ?");
        args.push(FilterValue::Str(leave_type.to_string()));
    }
    if let Some(year) = query.year {
        conditions.push("year = ?");
        args.push(FilterValue::I32(year));
    }
    let where_sql = where_clause(&conditions);

    let count_sql = format!("SELECT COUNT(*) FROM leave_balances{}", where_sql);
    let total = bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql), &args)
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to count leave balances");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let data_sql = format!(
        "SELECT {} FROM leave_balances{} ORDER BY year DESC, employee_id, leave_type LIMIT ? OFFSET ?",
        BALANCE_COLUMNS, where_sql
    );
    let rows = bind_as(sqlx::query_as::<_, BalanceRow>(&data_sql), &args)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch leave balances");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(BalanceListResponse {
        data: convert_all(rows)?,
        page,
        per_page,
        total,
    }))
}

/// Every balance an employee holds for one year.
#[utoipa::path(
    get,
    path = "/api/v1/leave-balances/employee/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        YearQuery
    ),
    responses(
        (status = 200, description = "Balances for the year", body = [LeaveBalance]),
        (status = 403, description = "Neither the employee nor HR/Admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Balance"
)]
pub async fn employee_balances(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<YearQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    let actor = auth.actor();
    if actor.employee_id != Some(employee_id) && !actor.can(Operation::ManageBalances) {
        return Err(WorkflowError::forbidden("Not allowed to view these balances").into());
    }

    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let sql = format!(
        "SELECT {} FROM leave_balances WHERE employee_id = ? AND year = ? ORDER BY leave_type",
        BALANCE_COLUMNS
    );
    let rows = sqlx::query_as::<_, BalanceRow>(&sql)
        .bind(employee_id)
        .bind(year)
        .fetch_all(pool.get_ref())
        .await
        .map_err(WorkflowError::from)?;

    let balances: Vec<LeaveBalance> = convert_all(rows)?;
    Ok(HttpResponse::Ok().json(balances))
}

/// Opens a year's balance. Without an explicit total the policy's annual
/// limit applies, plus whatever the policy lets carry over from last year.
#[utoipa::path(
    post,
    path = "/api/v1/leave-balances",
    request_body = OpenBalance,
    responses(
        (status = 201, description = "Balance opened", body = LeaveBalance),
        (status = 400, description = "No policy for the leave type or negative total"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Balance already exists for this year")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Balance"
)]
#[instrument(
    name = "balance_open",
    skip_all,
    fields(employee_id = payload.employee_id, leave_type = %payload.leave_type, year = payload.year)
)]
pub async fn open_balance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    service: web::Data<LeaveService>,
    payload: web::Json<OpenBalance>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Operation::ManageBalances)?;
    let payload = payload.into_inner();
    let store = service.store();

    let key = LedgerKey {
        employee_id: payload.employee_id,
        leave_type: payload.leave_type,
        year: payload.year,
    };

    let total_days = match payload.total_days {
        Some(total) => total,
        None => {
            let policy = store
                .policy_for(key.leave_type)
                .await?
                .ok_or(WorkflowError::from(Violation::NoPolicy {
                    leave_type: key.leave_type,
                }))?;
            let previous = store
                .balance(&LedgerKey {
                    year: key.year - 1,
                    ..key
                })
                .await?;
            opening_total(&policy, previous.as_ref())
        }
    };
    if total_days < 0 {
        return Ok(HttpResponse::BadRequest().json(json!({
            "error": "total_days must not be negative"
        })));
    }

    let balance = LeaveBalance::open(key, total_days);
    let result = sqlx::query(
        r#"
        INSERT INTO leave_balances (employee_id, leave_type, year, total_days, used_days, remaining_days)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(balance.employee_id)
    .bind(balance.leave_type.as_ref())
    .bind(balance.year)
    .bind(balance.total_days)
    .bind(balance.used_days)
    .bind(balance.remaining_days)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => {
            info!(total_days, "Leave balance opened");
            Ok(HttpResponse::Created().json(balance))
        }
        Err(e) if is_unique_violation(&e) => Ok(HttpResponse::Conflict().json(json!({
            "error": "balance_exists",
            "message": "A balance for this employee, leave type and year already exists"
        }))),
        Err(e) if is_foreign_key_violation(&e) => {
            Err(WorkflowError::not_found("employee", balance.employee_id).into())
        }
        Err(e) => Err(WorkflowError::from(e).into()),
    }
}
