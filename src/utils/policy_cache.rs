use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

use crate::db::rows::{POLICY_COLUMNS, PolicyRow};
use crate::model::{leave_policy::LeavePolicy, leave_request::LeaveType};

/// Active policy per leave type. Inactive policies are never cached, so a
/// miss always falls through to the database.
pub static POLICY_CACHE: Lazy<Cache<LeaveType, LeavePolicy>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(64)
        .time_to_live(Duration::from_secs(600)) // 10 min TTL
        .build()
});

pub async fn get(leave_type: LeaveType) -> Option<LeavePolicy> {
    POLICY_CACHE.get(&leave_type).await
}

pub async fn put(policy: &LeavePolicy) {
    if policy.is_active {
        POLICY_CACHE.insert(policy.leave_type, policy.clone()).await;
    } else {
        POLICY_CACHE.invalidate(&policy.leave_type).await;
    }
}

/// Must be called after every policy write.
pub async fn invalidate(leave_type: LeaveType) {
    POLICY_CACHE.invalidate(&leave_type).await;
}

/// Loads all active policies into the cache.
pub async fn warmup_policy_cache(pool: &MySqlPool) -> Result<()> {
    let sql = format!(
        "SELECT {} FROM leave_policies WHERE is_active = TRUE",
        POLICY_COLUMNS
    );
    let mut stream = sqlx::query_as::<_, PolicyRow>(&sql).fetch(pool);

    let mut total_count = 0usize;
    while let Some(row) = stream.next().await {
        let policy = LeavePolicy::try_from(row?)?;
        put(&policy).await;
        total_count += 1;
    }

    log::info!("Policy cache warmup complete: {} active policies", total_count);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn policy(leave_type: LeaveType, is_active: bool) -> LeavePolicy {
        LeavePolicy {
            id: 9,
            leave_type,
            annual_limit: 90,
            min_days_notice: 30,
            max_consecutive_days: 90,
            carry_forward_allowed: false,
            carry_forward_limit: None,
            requires_medical_certificate: false,
            is_active,
        }
    }

    #[test]
    fn only_active_policies_are_cached() {
        block_on(async {
            put(&policy(LeaveType::Maternity, true)).await;
            assert!(get(LeaveType::Maternity).await.is_some());

            put(&policy(LeaveType::Maternity, false)).await;
            assert!(get(LeaveType::Maternity).await.is_none());
        });
    }

    #[test]
    fn invalidate_drops_entry() {
        block_on(async {
            put(&policy(LeaveType::Paternity, true)).await;
            invalidate(LeaveType::Paternity).await;
            assert!(get(LeaveType::Paternity).await.is_none());
        });
    }
}
