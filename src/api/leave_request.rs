use crate::{
    api::{FilterValue, LeaveService, bind_as, bind_scalar, page_bounds, where_clause},
    auth::auth::AuthUser,
    db::rows::{LeaveRequestRow, REQUEST_COLUMNS, convert_all},
    model::{
        approval_step::Decision,
        leave_request::{LeaveDetails, LeaveRequest, LeaveStatus, LeaveType},
    },
    workflow::{
        access::Operation,
        error::WorkflowError,
        service::{DecisionOutcome, LeaveApplication},
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "casual")]
    pub leave_type: LeaveType,
    #[schema(example = "2026-11-02", format = "date", value_type = String)]
    pub from_date: NaiveDate,
    #[schema(example = "2026-11-04", format = "date", value_type = String)]
    pub to_date: NaiveDate,
    #[schema(example = "Family vacation")]
    pub reason: String,
    /// Declares that a medical certificate accompanies the request
    #[serde(default)]
    #[schema(example = false)]
    pub medical_certificate: bool,
}

#[derive(Deserialize, Default, ToSchema)]
pub struct DecisionBody {
    #[schema(example = "Enjoy your time off", nullable = true)]
    pub comments: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    /// Filter by employee ID (HR/Admin only; others always see their own)
    #[schema(example = 4)]
    pub employee_id: Option<u64>,
    /// Filter by leave status
    #[schema(example = "pending")]
    pub status: Option<LeaveStatus>,
    /// Filter by leave type
    #[schema(example = "casual")]
    pub leave_type: Option<LeaveType>,
    /// Requests overlapping this year
    #[schema(example = 2026)]
    pub year: Option<i32>,
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u32>,
    /// Pagination per page number
    #[schema(example = 10)]
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
#[schema(example = json!({
    "data": [
        {
            "id": 1,
            "employee_id": 4,
            "leave_type": "casual",
            "from_date": "2026-11-02",
            "to_date": "2026-11-04",
            "reason": "Family vacation",
            "days_count": 3,
            "medical_certificate": false,
            "status": "pending",
            "created_at": "2026-10-19T09:00:00Z",
            "updated_at": "2026-10-19T09:00:00Z"
        }
    ],
    "page": 1,
    "per_page": 10,
    "total": 1
}))]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

/* =========================
Submit leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted with its approval chain", body = LeaveDetails),
        (status = 400, description = "Rejected by policy", body = Object, example = json!({
            "error": "exceeds_consecutive_limit",
            "message": "request covers 6 working days but at most 5 consecutive days are allowed",
            "details": { "kind": "exceeds_consecutive_limit", "requested": 6, "max": 5 }
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No active employee profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    service: web::Data<LeaveService>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let application = LeaveApplication {
        leave_type: payload.leave_type,
        from_date: payload.from_date,
        to_date: payload.to_date,
        reason: payload.reason,
        medical_certificate: payload.medical_certificate,
    };

    let details = service
        .submit(&auth.actor(), application, Utc::now().date_naive())
        .await?;

    Ok(HttpResponse::Created().json(details))
}

async fn decide(
    auth: AuthUser,
    service: web::Data<LeaveService>,
    path: web::Path<(u64, u32)>,
    body: Option<web::Json<DecisionBody>>,
    decision: Decision,
) -> Result<DecisionOutcome, WorkflowError> {
    let (leave_id, step_order) = path.into_inner();
    let comments = body.and_then(|b| b.into_inner().comments);

    service
        .decide(&auth.actor(), leave_id, step_order, decision, comments, Utc::now())
        .await
}

/* =========================
Approve an approval step
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/steps/{step_order}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request"),
        ("step_order" = u32, Path, description = "Approval step to act on (1-based)")
    ),
    request_body(content = DecisionBody, description = "Optional comment"),
    responses(
        (status = 200, description = "Step approved", body = DecisionOutcome),
        (status = 400, description = "Balance no longer covers the request"),
        (status = 403, description = "Step is addressed to another role or approver"),
        (status = 404, description = "Leave request or step not found"),
        (status = 409, description = "Step is not current or already decided", body = Object, example = json!({
            "error": "not_current_step",
            "message": "step 2 is not the current approval step"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    service: web::Data<LeaveService>,
    path: web::Path<(u64, u32)>,
    body: Option<web::Json<DecisionBody>>,
) -> actix_web::Result<impl Responder> {
    let outcome = decide(auth, service, path, body, Decision::Approve).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/* =========================
Reject an approval step
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/steps/{step_order}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request"),
        ("step_order" = u32, Path, description = "Approval step to act on (1-based)")
    ),
    request_body(content = DecisionBody, description = "Optional comment"),
    responses(
        (status = 200, description = "Step rejected; the request is rejected", body = DecisionOutcome),
        (status = 403, description = "Step is addressed to another role or approver"),
        (status = 404, description = "Leave request or step not found"),
        (status = 409, description = "Step is not current or already decided")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    service: web::Data<LeaveService>,
    path: web::Path<(u64, u32)>,
    body: Option<web::Json<DecisionBody>>,
) -> actix_web::Result<impl Responder> {
    let outcome = decide(auth, service, path, body, Decision::Reject).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// A leave request together with its approval steps
#[utoipa::path(
    get,
    path = "/api/v1/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveDetails),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found", body = Object, example = json!({
            "error": "not_found",
            "message": "leave request 42 not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    service: web::Data<LeaveService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let details = service.details(&auth.actor(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(details))
}

/// Requests whose current step waits on the caller
#[utoipa::path(
    get,
    path = "/api/v1/leave/pending-approvals",
    responses(
        (status = 200, description = "Approver inbox", body = [LeaveRequest]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller holds no approver role")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn pending_approvals(
    auth: AuthUser,
    service: web::Data<LeaveService>,
) -> actix_web::Result<impl Responder> {
    let pending = service.pending_for(&auth.actor()).await?;
    Ok(HttpResponse::Ok().json(pending))
}

/// for getting leave applications endpoint
#[utoipa::path(
    get,
    path = "/api/v1/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    let actor = auth.actor();
    let (page, per_page, offset) = page_bounds(query.page, query.per_page);

    // -------------------------
    // WHERE clause
    // -------------------------
    let mut conditions = Vec::new();
    let mut args: Vec<FilterValue> = Vec::new();

    let employee_filter = if actor.can(Operation::ViewAllLeave) {
        query.employee_id
    } else {
        Some(actor.employee()?)
    };
    if let Some(emp_id) = employee_filter {
        conditions.push("employee_id = ?");
        args.push(FilterValue::U64(emp_id));
    }

    if let Some(status) = query.status {
        conditions.push("status = ?");
        args.push(FilterValue::Str(status.to_string()));
    }

    if let Some(leave_type) = query.leave_type {
        conditions.push("leave_type = ?");
        args.push(FilterValue::Str(leave_type.to_string()));
    }

    if let Some(year) = query.year {
        conditions.push("YEAR(from_date) <= ? AND YEAR(to_date) >= ?");
        args.push(FilterValue::I32(year));
        args.push(FilterValue::I32(year));
    }

    let where_sql = where_clause(&conditions);

    // -------------------------
    // COUNT query
    // -------------------------
    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{}", where_sql);
    let total = bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql), &args)
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to count leave requests");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    // -------------------------
    // DATA query
    // -------------------------
    let data_sql = format!(
        r#"
        SELECT {}
        FROM leave_requests
        {}
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
        REQUEST_COLUMNS, where_sql
    );

    let rows = bind_as(sqlx::query_as::<_, LeaveRequestRow>(&data_sql), &args)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch leave list");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: convert_all(rows)?,
        page,
        per_page,
        total,
    }))
}
