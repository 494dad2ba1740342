use crate::{
    api::{FilterValue, bind_as, bind_scalar, page_bounds, where_clause},
    auth::auth::AuthUser,
    db::{
        is_foreign_key_violation, is_unique_violation,
        rows::{EMPLOYEE_COLUMNS, EmployeeRow, convert_all},
    },
    model::{
        employee::{Employee, EmployeeStatus},
        role::Role,
    },
    utils::db_utils::{build_update_sql, execute_update},
    workflow::{access::Operation, error::WorkflowError, hierarchy::ManagerIndex},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use utoipa::{IntoParams, ToSchema};

/// Columns `PUT /employee/{id}` may touch. Manager and status have their
/// own endpoints.
const PROFILE_COLUMNS: &[&str] = &["employee_code", "name", "email", "position", "department_id", "joining_date"];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "EMP004")]
    pub employee_code: String,
    #[schema(example = "Emily Davis")]
    pub name: String,
    #[schema(example = "employee@company.com", format = "email", nullable = true)]
    pub email: Option<String>,
    #[schema(example = "Software Developer")]
    pub position: String,
    #[schema(example = 1)]
    pub department_id: u64,
    #[schema(example = 3, nullable = true)]
    pub manager_id: Option<u64>,
    #[schema(example = "2024-02-15", format = "date", value_type = String)]
    pub joining_date: NaiveDate,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department_id: Option<u64>,
    /// Direct reports of this manager
    pub manager_id: Option<u64>,
    pub status: Option<EmployeeStatus>,
    /// Matches name, email or employee code
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 10)]
    pub total: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct AssignManager {
    /// `null` removes the reporting line
    #[schema(example = 3, nullable = true)]
    pub manager_id: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct SetStatus {
    #[schema(example = "inactive")]
    pub status: EmployeeStatus,
}

async fn fetch_employee(pool: &MySqlPool, employee_id: u64) -> Result<Employee, WorkflowError> {
    let sql = format!("SELECT {} FROM employees WHERE id = ?", EMPLOYEE_COLUMNS);
    let row = sqlx::query_as::<_, EmployeeRow>(&sql)
        .bind(employee_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| WorkflowError::not_found("employee", employee_id))?;
    Employee::try_from(row)
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/v1/employee",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 400, description = "Unknown department"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Manager not found"),
        (status = 409, description = "Employee code already exists")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
#[instrument(name = "employee_create", skip_all, fields(employee_code = %payload.employee_code))]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Operation::ManageEmployees)?;

    // a new employee has no reports, so any existing manager is cycle-free
    if let Some(manager_id) = payload.manager_id {
        fetch_employee(pool.get_ref(), manager_id).await?;
    }

    let result = sqlx::query(
        r#"
        INSERT INTO employees
        (employee_code, name, email, position, department_id, manager_id, joining_date, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&payload.employee_code)
    .bind(&payload.name)
    .bind(payload.email.as_deref())
    .bind(&payload.position)
    .bind(payload.department_id)
    .bind(payload.manager_id)
    .bind(payload.joining_date)
    .bind(EmployeeStatus::Active.as_ref())
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(done) => {
            let employee = fetch_employee(pool.get_ref(), done.last_insert_id()).await?;
            info!(employee_id = employee.id, "Employee created");
            Ok(HttpResponse::Created().json(employee))
        }
        Err(e) if is_unique_violation(&e) => Ok(HttpResponse::Conflict().json(json!({
            "message": "Employee code already exists"
        }))),
        Err(e) if is_foreign_key_violation(&e) => Ok(HttpResponse::BadRequest().json(json!({
            "message": "Unknown department"
        }))),
        Err(e) => {
            error!(error = %e, "Failed to Create Employee");
            Ok(HttpResponse::InternalServerError().json(json!({
                "message": "Something went wrong, Contact with system admin"
            })))
        }
    }
}

// -------------------- Handler --------------------

#[utoipa::path(
    get,
    path = "/api/v1/employee",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 403, description = "HR/Admin, or a line manager listing their own reports")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor();
    let own_reports = actor.role == Role::LineManager
        && query.manager_id.is_some()
        && query.manager_id == actor.employee_id;
    if !own_reports {
        actor.require(Operation::ManageEmployees)?;
    }

    let (page, per_page, offset) = page_bounds(query.page, query.per_page);

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();
    let mut bindings: Vec<FilterValue> = Vec::new();

    if let Some(department_id) = query.department_id {
        conditions.push("department_id = ?");
        bindings.push(FilterValue::U64(department_id));
    }

    if let Some(manager_id) = query.manager_id {
        conditions.push("manager_id = ?");
        bindings.push(FilterValue::U64(manager_id));
    }

    if let Some(status) = query.status {
        conditions.push("status = ?");
        bindings.push(FilterValue::Str(status.to_string()));
    }

    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        conditions.push("(name LIKE ? OR email LIKE ? OR employee_code LIKE ?)");
        let like = format!("%{}%", search.trim());
        bindings.push(FilterValue::Str(like.clone()));
        bindings.push(FilterValue::Str(like.clone()));
        bindings.push(FilterValue::Str(like));
    }

    let where_sql = where_clause(&conditions);

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) FROM employees{}", where_sql);
    debug!(sql = %count_sql, bindings = ?bindings, "Counting employees");

    let total = bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql), &bindings)
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, sql = %count_sql, "Failed to count employees");
            actix_web::error::ErrorInternalServerError("Database error")
        })?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT {} FROM employees{} ORDER BY id DESC LIMIT ? OFFSET ?",
        EMPLOYEE_COLUMNS, where_sql
    );
    debug!(sql = %data_sql, page, per_page, offset, "Fetching employees");

    let rows = bind_as(sqlx::query_as::<_, EmployeeRow>(&data_sql), &bindings)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, sql = %data_sql, "Failed to fetch employees");
            actix_web::error::ErrorInternalServerError("Database error")
        })?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: convert_all(rows)?,
        page,
        per_page,
        total,
    }))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/v1/employee/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 403, description = "Not the employee, their manager, or HR/Admin"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "error": "not_found",
            "message": "employee 42 not found"
        }))
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id: u64 = path.into_inner();
    let actor = auth.actor();
    let employee = fetch_employee(pool.get_ref(), employee_id).await?;

    let is_self = actor.employee_id == Some(employee.id);
    let is_manager = employee.manager_id.is_some() && actor.employee_id == employee.manager_id;
    if !is_self && !is_manager {
        actor.require(Operation::ManageEmployees)?;
    }

    Ok(HttpResponse::Ok().json(employee))
}

/// Update Employee profile fields
#[utoipa::path(
    put,
    path = "/api/v1/employee/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    request_body(content = Object, description = "Any of employee_code, name, email, position, department_id, joining_date"),
    responses(
        (status = 200, description = "Employee updated", body = Employee),
        (status = 400, description = "Unknown or protected field"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Employee code already exists")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Operation::ManageEmployees)?;
    let employee_id = path.into_inner();

    let update = build_update_sql("employees", &body, PROFILE_COLUMNS, "id", employee_id)?;

    match execute_update(pool.get_ref(), update).await {
        Ok(0) => Err(WorkflowError::not_found("employee", employee_id).into()),
        Ok(_) => {
            info!(employee_id, "Employee profile updated");
            Ok(HttpResponse::Ok().json(fetch_employee(pool.get_ref(), employee_id).await?))
        }
        Err(e) if is_unique_violation(&e) => Ok(HttpResponse::Conflict().json(json!({
            "message": "Employee code already exists"
        }))),
        Err(e) if is_foreign_key_violation(&e) => Ok(HttpResponse::BadRequest().json(json!({
            "message": "Unknown department"
        }))),
        Err(e) => Err(WorkflowError::from(e).into()),
    }
}

/// Sets or clears an employee's line manager
#[utoipa::path(
    put,
    path = "/api/v1/employee/{employee_id}/manager",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    request_body = AssignManager,
    responses(
        (status = 200, description = "Manager assigned", body = Employee),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Employee or manager not found"),
        (status = 409, description = "Assignment would create a reporting cycle", body = Object, example = json!({
            "error": "manager_cycle",
            "message": "assigning manager 4 to employee 3 would create a reporting cycle"
        }))
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
#[instrument(name = "employee_assign_manager", skip_all, fields(employee_id = *path, manager_id = ?payload.manager_id))]
pub async fn assign_manager(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AssignManager>,
) -> actix_web::Result<impl Responder> {
    auth.require(Operation::ManageEmployees)?;
    let employee_id = path.into_inner();

    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;

    // lock every reporting line so concurrent reassignments cannot race into a cycle
    let pairs = sqlx::query_as::<_, (u64, Option<u64>)>("SELECT id, manager_id FROM employees FOR UPDATE")
        .fetch_all(&mut *tx)
        .await
        .map_err(WorkflowError::from)?;

    let mut index = ManagerIndex::from_pairs(pairs);
    index.assign(employee_id, payload.manager_id)?;

    sqlx::query("UPDATE employees SET manager_id = ? WHERE id = ?")
        .bind(payload.manager_id)
        .bind(employee_id)
        .execute(&mut *tx)
        .await
        .map_err(WorkflowError::from)?;

    tx.commit().await.map_err(WorkflowError::from)?;
    info!(direct_reports = index.direct_reports(employee_id).len(), "Manager assigned");

    Ok(HttpResponse::Ok().json(fetch_employee(pool.get_ref(), employee_id).await?))
}

/// Activates or retires an employee. Retiring also disables linked logins.
#[utoipa::path(
    put,
    path = "/api/v1/employee/{employee_id}/status",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    request_body = SetStatus,
    responses(
        (status = 200, description = "Status changed", body = Employee),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
#[instrument(name = "employee_set_status", skip_all, fields(employee_id = *path, status = %payload.status))]
pub async fn set_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<SetStatus>,
) -> actix_web::Result<impl Responder> {
    auth.require(Operation::ManageEmployees)?;
    let employee_id = path.into_inner();
    let status = payload.status;

    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;

    let updated = sqlx::query("UPDATE employees SET status = ? WHERE id = ?")
        .bind(status.as_ref())
        .bind(employee_id)
        .execute(&mut *tx)
        .await
        .map_err(WorkflowError::from)?;

    // MySQL reports 0 affected rows when the value is unchanged
    if updated.rows_affected() == 0 {
        let found = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees WHERE id = ?")
            .bind(employee_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(WorkflowError::from)?;
        if found == 0 {
            return Err(WorkflowError::not_found("employee", employee_id).into());
        }
    }

    sqlx::query("UPDATE users SET is_active = ? WHERE employee_id = ?")
        .bind(status == EmployeeStatus::Active)
        .bind(employee_id)
        .execute(&mut *tx)
        .await
        .map_err(WorkflowError::from)?;

    tx.commit().await.map_err(WorkflowError::from)?;
    info!("Employee status changed");

    Ok(HttpResponse::Ok().json(fetch_employee(pool.get_ref(), employee_id).await?))
}
