use chrono::{NaiveDate, SubsecRound, Utc};
use sqlx::{MySql, MySqlPool};
use tracing::debug;

use crate::db::rows::{
    ApprovalStepRow, BALANCE_COLUMNS, BalanceRow, EMPLOYEE_COLUMNS, EmployeeRow, LeaveRequestRow,
    POLICY_COLUMNS, PolicyRow, REQUEST_COLUMNS, STEP_COLUMNS, convert_all,
};
use crate::model::{
    approval_step::ApprovalStep,
    employee::Employee,
    leave_balance::{LeaveBalance, LedgerKey},
    leave_policy::LeavePolicy,
    leave_request::{LeaveRequest, LeaveStatus, LeaveType},
    role::Role,
};
use crate::utils::policy_cache;
use crate::workflow::{
    chain::ApprovalChain,
    error::WorkflowError,
    policy::LeaveDraft,
    store::{WorkflowRecord, WorkflowStore},
};

/// `WorkflowStore` over MySQL. Decisions lock the request row and its
/// balance row with `SELECT ... FOR UPDATE` inside one transaction.
#[derive(Clone)]
pub struct MySqlWorkflowStore {
    pool: MySqlPool,
}

impl MySqlWorkflowStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

async fn steps_of<'e, E>(executor: E, request_id: u64, lock: bool) -> Result<Vec<ApprovalStep>, WorkflowError>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    let sql = format!(
        "SELECT {} FROM approval_steps WHERE leave_request_id = ? ORDER BY step_order{}",
        STEP_COLUMNS,
        if lock { " FOR UPDATE" } else { "" }
    );
    let rows = sqlx::query_as::<_, ApprovalStepRow>(&sql)
        .bind(request_id)
        .fetch_all(executor)
        .await?;
    convert_all(rows)
}

impl WorkflowStore for MySqlWorkflowStore {
    async fn employee(&self, id: u64) -> Result<Option<Employee>, WorkflowError> {
        let sql = format!("SELECT {} FROM employees WHERE id = ?", EMPLOYEE_COLUMNS);
        sqlx::query_as::<_, EmployeeRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Employee::try_from)
            .transpose()
    }

    async fn policy_for(&self, leave_type: LeaveType) -> Result<Option<LeavePolicy>, WorkflowError> {
        if let Some(policy) = policy_cache::get(leave_type).await {
            return Ok(Some(policy));
        }

        let sql = format!(
            "SELECT {} FROM leave_policies WHERE leave_type = ? ORDER BY is_active DESC, id DESC LIMIT 1",
            POLICY_COLUMNS
        );
        let policy = sqlx::query_as::<_, PolicyRow>(&sql)
            .bind(leave_type.as_ref())
            .fetch_optional(&self.pool)
            .await?
            .map(LeavePolicy::try_from)
            .transpose()?;

        if let Some(policy) = &policy {
            policy_cache::put(policy).await;
        }
        Ok(policy)
    }

    async fn balance(&self, key: &LedgerKey) -> Result<Option<LeaveBalance>, WorkflowError> {
        let sql = format!(
            "SELECT {} FROM leave_balances WHERE employee_id = ? AND leave_type = ? AND year = ?",
            BALANCE_COLUMNS
        );
        sqlx::query_as::<_, BalanceRow>(&sql)
            .bind(key.employee_id)
            .bind(key.leave_type.as_ref())
            .bind(key.year)
            .fetch_optional(&self.pool)
            .await?
            .map(LeaveBalance::try_from)
            .transpose()
    }

    async fn holidays_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<NaiveDate>, WorkflowError> {
        let dates = sqlx::query_scalar::<_, NaiveDate>(
            "SELECT date FROM holidays WHERE date BETWEEN ? AND ? ORDER BY date",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(dates)
    }

    async fn insert_request(
        &self,
        draft: &LeaveDraft,
        chain: &ApprovalChain,
    ) -> Result<LeaveRequest, WorkflowError> {
        // TIMESTAMP columns hold whole seconds
        let now = Utc::now().trunc_subsecs(0);
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (employee_id, leave_type, from_date, to_date, reason, days_count,
                 medical_certificate, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(draft.employee_id)
        .bind(draft.leave_type.as_ref())
        .bind(draft.from_date)
        .bind(draft.to_date)
        .bind(&draft.reason)
        .bind(draft.days_count)
        .bind(draft.medical_certificate)
        .bind(LeaveStatus::Pending.as_ref())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_id();

        for step in chain.steps() {
            sqlx::query(
                r#"
                INSERT INTO approval_steps
                    (leave_request_id, step_order, approver_role, status, is_current)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(id)
            .bind(step.step_order)
            .bind(step.approver_role.as_ref())
            .bind(step.status.as_ref())
            .bind(step.is_current)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(leave_id = id, steps = chain.steps().len(), "Stored leave request");

        Ok(LeaveRequest {
            id,
            employee_id: draft.employee_id,
            leave_type: draft.leave_type,
            from_date: draft.from_date,
            to_date: draft.to_date,
            reason: draft.reason.clone(),
            days_count: draft.days_count,
            medical_certificate: draft.medical_certificate,
            status: LeaveStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    async fn load(&self, request_id: u64) -> Result<Option<(LeaveRequest, ApprovalChain)>, WorkflowError> {
        let sql = format!("SELECT {} FROM leave_requests WHERE id = ?", REQUEST_COLUMNS);
        let Some(row) = sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let request = LeaveRequest::try_from(row)?;
        let chain = ApprovalChain::from_steps(steps_of(&self.pool, request_id, false).await?)?;
        Ok(Some((request, chain)))
    }

    async fn pending_for_role(&self, role: Role) -> Result<Vec<LeaveRequest>, WorkflowError> {
        let sql = format!(
            r#"
            SELECT {} FROM leave_requests
            WHERE status = ?
              AND id IN (
                SELECT leave_request_id FROM approval_steps
                WHERE is_current = TRUE AND approver_role = ?
              )
            ORDER BY id
            "#,
            REQUEST_COLUMNS
        );
        let rows = sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind(LeaveStatus::Pending.as_ref())
            .bind(role.as_ref())
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn update_locked<F, T>(&self, request_id: u64, apply: F) -> Result<T, WorkflowError>
    where
        F: FnOnce(&mut WorkflowRecord) -> Result<T, WorkflowError>,
    {
        // dropping `tx` on any early return rolls it back
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {} FROM leave_requests WHERE id = ? FOR UPDATE",
            REQUEST_COLUMNS
        );
        let request = sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind(request_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| WorkflowError::not_found("leave request", request_id))?;
        let request = LeaveRequest::try_from(request)?;

        let chain = ApprovalChain::from_steps(steps_of(&mut *tx, request_id, true).await?)?;

        let key = LedgerKey::for_request(&request);
        let sql = format!(
            "SELECT {} FROM leave_balances WHERE employee_id = ? AND leave_type = ? AND year = ? FOR UPDATE",
            BALANCE_COLUMNS
        );
        let balance = sqlx::query_as::<_, BalanceRow>(&sql)
            .bind(key.employee_id)
            .bind(key.leave_type.as_ref())
            .bind(key.year)
            .fetch_optional(&mut *tx)
            .await?
            .map(LeaveBalance::try_from)
            .transpose()?;

        let requester_manager_id = sqlx::query_scalar::<_, Option<u64>>(
            "SELECT manager_id FROM employees WHERE id = ?",
        )
        .bind(request.employee_id)
        .fetch_optional(&mut *tx)
        .await?
        .flatten();

        let mut record = WorkflowRecord {
            request,
            chain,
            balance,
            requester_manager_id,
        };
        let out = apply(&mut record)?;

        for step in record.chain.steps() {
            sqlx::query(
                r#"
                UPDATE approval_steps
                SET approver_id = ?, status = ?, comments = ?, approved_at = ?, is_current = ?
                WHERE leave_request_id = ? AND step_order = ?
                "#,
            )
            .bind(step.approver_id)
            .bind(step.status.as_ref())
            .bind(step.comments.as_deref())
            .bind(step.approved_at)
            .bind(step.is_current)
            .bind(request_id)
            .bind(step.step_order)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE leave_requests SET status = ?, updated_at = ? WHERE id = ?")
            .bind(record.request.status.as_ref())
            .bind(record.request.updated_at)
            .bind(request_id)
            .execute(&mut *tx)
            .await?;

        if let Some(balance) = &record.balance {
            sqlx::query(
                r#"
                UPDATE leave_balances
                SET total_days = ?, used_days = ?, remaining_days = ?
                WHERE employee_id = ? AND leave_type = ? AND year = ?
                "#,
            )
            .bind(balance.total_days)
            .bind(balance.used_days)
            .bind(balance.remaining_days)
            .bind(balance.employee_id)
            .bind(balance.leave_type.as_ref())
            .bind(balance.year)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(out)
    }
}
