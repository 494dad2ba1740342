use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    auth::auth::AuthUser,
    db::rows::{POLICY_COLUMNS, PolicyRow, convert_all},
    model::{leave_policy::LeavePolicy, leave_request::LeaveType},
    utils::policy_cache,
    workflow::{access::Operation, error::WorkflowError, policy::ensure_single_active},
};

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "leave_type": "casual",
    "annual_limit": 12,
    "min_days_notice": 2,
    "max_consecutive_days": 5,
    "carry_forward_allowed": true,
    "carry_forward_limit": 5,
    "requires_medical_certificate": false,
    "is_active": true
}))]
pub struct PolicyPayload {
    pub leave_type: LeaveType,
    pub annual_limit: i32,
    pub min_days_notice: i32,
    pub max_consecutive_days: i32,
    #[serde(default)]
    pub carry_forward_allowed: bool,
    pub carry_forward_limit: Option<i32>,
    #[serde(default)]
    pub requires_medical_certificate: bool,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

fn active_by_default() -> bool {
    true
}

impl PolicyPayload {
    fn check(&self) -> Result<(), HttpResponse> {
        let negative = [
            self.annual_limit,
            self.min_days_notice,
            self.max_consecutive_days,
            self.carry_forward_limit.unwrap_or(0),
        ]
        .iter()
        .any(|v| *v < 0);
        if negative {
            return Err(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Policy limits must not be negative"
            })));
        }
        if self.max_consecutive_days == 0 {
            return Err(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "max_consecutive_days must be at least 1"
            })));
        }
        Ok(())
    }

    fn into_policy(self, id: u64) -> LeavePolicy {
        LeavePolicy {
            id,
            leave_type: self.leave_type,
            annual_limit: self.annual_limit,
            min_days_notice: self.min_days_notice,
            max_consecutive_days: self.max_consecutive_days,
            carry_forward_allowed: self.carry_forward_allowed,
            carry_forward_limit: self.carry_forward_limit,
            requires_medical_certificate: self.requires_medical_certificate,
            is_active: self.is_active,
        }
    }
}

/// Policies of one type, locked for the rest of the transaction.
async fn lock_policies_of(
    conn: &mut sqlx::MySqlConnection,
    leave_type: LeaveType,
) -> Result<Vec<LeavePolicy>, WorkflowError> {
    let sql = format!(
        "SELECT {} FROM leave_policies WHERE leave_type = ? FOR UPDATE",
        POLICY_COLUMNS
    );
    let rows = sqlx::query_as::<_, PolicyRow>(&sql)
        .bind(leave_type.as_ref())
        .fetch_all(conn)
        .await?;
    convert_all(rows)
}

/// All leave policies, active first.
#[utoipa::path(
    get,
    path = "/api/v1/leave-policies",
    responses(
        (status = 200, description = "Leave policies", body = [LeavePolicy]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Policy"
)]
pub async fn list_policies(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let sql = format!(
        "SELECT {} FROM leave_policies ORDER BY is_active DESC, leave_type, id",
        POLICY_COLUMNS
    );
    let rows = sqlx::query_as::<_, PolicyRow>(&sql)
        .fetch_all(pool.get_ref())
        .await
        .map_err(WorkflowError::from)?;

    let policies: Vec<LeavePolicy> = convert_all(rows)?;
    Ok(HttpResponse::Ok().json(policies))
}

#[utoipa::path(
    post,
    path = "/api/v1/leave-policies",
    request_body = PolicyPayload,
    responses(
        (status = 201, description = "Policy created", body = LeavePolicy),
        (status = 400, description = "Invalid limits"),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "An active policy already exists for this leave type", body = Object, example = json!({
            "error": "policy_conflict",
            "message": "an active casual policy already exists"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Policy"
)]
#[instrument(name = "policy_create", skip_all, fields(leave_type = %payload.leave_type))]
pub async fn create_policy(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<PolicyPayload>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Operation::ManagePolicies)?;
    let payload = payload.into_inner();
    if let Err(resp) = payload.check() {
        return Ok(resp);
    }

    let leave_type = payload.leave_type;
    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;

    let existing = lock_policies_of(&mut tx, leave_type).await?;
    if payload.is_active {
        ensure_single_active(&existing, leave_type, None)?;
    }

    let result = sqlx::query(
        r#"
        INSERT INTO leave_policies
            (leave_type, annual_limit, min_days_notice, max_consecutive_days,
             carry_forward_allowed, carry_forward_limit, requires_medical_certificate, is_active)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(leave_type.as_ref())
    .bind(payload.annual_limit)
    .bind(payload.min_days_notice)
    .bind(payload.max_consecutive_days)
    .bind(payload.carry_forward_allowed)
    .bind(payload.carry_forward_limit)
    .bind(payload.requires_medical_certificate)
    .bind(payload.is_active)
    .execute(&mut *tx)
    .await
    .map_err(WorkflowError::from)?;

    tx.commit().await.map_err(WorkflowError::from)?;
    policy_cache::invalidate(leave_type).await;

    let policy = payload.into_policy(result.last_insert_id());
    info!(policy_id = policy.id, is_active = policy.is_active, "Leave policy created");

    Ok(HttpResponse::Created().json(policy))
}

/// Replaces a policy. Activating it fails while another active policy of
/// the same type exists.
#[utoipa::path(
    put,
    path = "/api/v1/leave-policies/{policy_id}",
    params(("policy_id" = u64, Path, description = "Policy ID")),
    request_body = PolicyPayload,
    responses(
        (status = 200, description = "Policy updated", body = LeavePolicy),
        (status = 400, description = "Invalid limits"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Policy not found"),
        (status = 409, description = "An active policy already exists for this leave type")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Policy"
)]
#[instrument(name = "policy_update", skip_all, fields(policy_id = *path))]
pub async fn update_policy(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<PolicyPayload>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Operation::ManagePolicies)?;
    let policy_id = path.into_inner();
    let payload = payload.into_inner();
    if let Err(resp) = payload.check() {
        return Ok(resp);
    }

    let mut tx = pool.begin().await.map_err(WorkflowError::from)?;

    let previous_type = sqlx::query_scalar::<_, String>(
        "SELECT leave_type FROM leave_policies WHERE id = ? FOR UPDATE",
    )
    .bind(policy_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(WorkflowError::from)?
    .ok_or_else(|| WorkflowError::not_found("leave policy", policy_id))?;

    let leave_type = payload.leave_type;
    let existing = lock_policies_of(&mut tx, leave_type).await?;
    if payload.is_active {
        ensure_single_active(&existing, leave_type, Some(policy_id))?;
    }

    sqlx::query(
        r#"
        UPDATE leave_policies
        SET leave_type = ?, annual_limit = ?, min_days_notice = ?, max_consecutive_days = ?,
            carry_forward_allowed = ?, carry_forward_limit = ?,
            requires_medical_certificate = ?, is_active = ?
        WHERE id = ?
        "#,
    )
    .bind(leave_type.as_ref())
    .bind(payload.annual_limit)
    .bind(payload.min_days_notice)
    .bind(payload.max_consecutive_days)
    .bind(payload.carry_forward_allowed)
    .bind(payload.carry_forward_limit)
    .bind(payload.requires_medical_certificate)
    .bind(payload.is_active)
    .bind(policy_id)
    .execute(&mut *tx)
    .await
    .map_err(WorkflowError::from)?;

    tx.commit().await.map_err(WorkflowError::from)?;

    policy_cache::invalidate(leave_type).await;
    if let Ok(previous) = previous_type.parse::<LeaveType>() {
        policy_cache::invalidate(previous).await;
    }

    let policy = payload.into_policy(policy_id);
    info!(is_active = policy.is_active, "Leave policy updated");

    Ok(HttpResponse::Ok().json(policy))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: serde_json::Value) -> PolicyPayload {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn defaults_to_active_without_certificate() {
        let p = payload(serde_json::json!({
            "leave_type": "paid",
            "annual_limit": 20,
            "min_days_notice": 7,
            "max_consecutive_days": 10
        }));
        assert!(p.is_active);
        assert!(!p.requires_medical_certificate);
        assert!(p.check().is_ok());
    }

    #[test]
    fn rejects_negative_limits() {
        let p = payload(serde_json::json!({
            "leave_type": "casual",
            "annual_limit": -1,
            "min_days_notice": 2,
            "max_consecutive_days": 5
        }));
        assert!(p.check().is_err());
    }
}
