use sqlx::MySqlPool;
use tracing::{info, warn};

use crate::{
    auth::password::hash_password, config::Config, db::is_unique_violation, model::role::Role,
};

/// First admin login, read from `BOOTSTRAP_ADMIN_*`. Privileged accounts
/// can only be registered by an admin, so a fresh database needs this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
    /// Employee record the login is linked to, if it exists
    pub employee_code: String,
}

impl BootstrapAdmin {
    pub fn new(username: Option<&str>, password: Option<&str>, employee_code: &str) -> Option<Self> {
        let username = username?.trim().to_lowercase();
        let password = password?;
        if username.is_empty() || password.is_empty() {
            return None;
        }
        Some(Self {
            username,
            password: password.to_string(),
            employee_code: employee_code.trim().to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Option<Self> {
        Self::new(
            config.bootstrap_admin_username.as_deref(),
            config.bootstrap_admin_password.as_deref(),
            &config.bootstrap_admin_employee_code,
        )
    }
}

/// Creates the admin login unless an admin already exists. Returns whether
/// an account was created.
pub async fn ensure_admin(pool: &MySqlPool, admin: &BootstrapAdmin) -> anyhow::Result<bool> {
    let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ?")
        .bind(Role::Admin.as_ref())
        .fetch_one(pool)
        .await?;
    if admins > 0 {
        return Ok(false);
    }

    let employee_id: Option<u64> =
        sqlx::query_scalar("SELECT id FROM employees WHERE employee_code = ?")
            .bind(&admin.employee_code)
            .fetch_optional(pool)
            .await?;
    if employee_id.is_none() {
        warn!(employee_code = %admin.employee_code, "Bootstrap admin has no employee profile");
    }

    let hashed = hash_password(&admin.password)
        .map_err(|e| anyhow::anyhow!("failed to hash bootstrap admin password: {}", e))?;

    let inserted = sqlx::query(
        "INSERT INTO users (username, password, role, employee_id) VALUES (?, ?, ?, ?)",
    )
    .bind(&admin.username)
    .bind(hashed)
    .bind(Role::Admin.as_ref())
    .bind(employee_id)
    .execute(pool)
    .await;

    match inserted {
        Ok(_) => {
            info!(username = %admin.username, ?employee_id, "Bootstrap admin created");
            Ok(true)
        }
        // another instance got there first, or the name is taken
        Err(e) if is_unique_violation(&e) => {
            warn!(username = %admin.username, "Bootstrap admin skipped, username or employee already linked");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leave_request::LeaveType;
    use std::str::FromStr;

    const SEED: &str = include_str!("../../migrations/20260103000000_seed_reference_data.sql");

    #[test]
    fn needs_both_username_and_password() {
        assert!(BootstrapAdmin::new(None, Some("pw"), "EMP001").is_none());
        assert!(BootstrapAdmin::new(Some("admin"), None, "EMP001").is_none());
        assert!(BootstrapAdmin::new(Some("  "), Some("pw"), "EMP001").is_none());
        assert!(BootstrapAdmin::new(Some("admin"), Some(""), "EMP001").is_none());

        let admin = BootstrapAdmin::new(Some(" Admin "), Some("pw"), "EMP001").unwrap();
        assert_eq!(admin.username, "admin");
        assert_eq!(admin.employee_code, "EMP001");
    }

    #[test]
    fn seed_data_backs_a_fresh_deployment() {
        assert!(SEED.contains("INSERT INTO departments"));
        assert!(SEED.contains("INSERT INTO holidays"));
        // default bootstrap admin links to the seeded profile
        assert!(SEED.contains("'EMP001'"));

        for leave_type in ["casual", "sick", "paid"] {
            assert!(LeaveType::from_str(leave_type).is_ok());
            assert!(SEED.contains(&format!("('{}',", leave_type)));
        }
    }
}
