pub mod employee;
pub mod error;
pub mod holiday;
pub mod leave_balance;
pub mod leave_policy;
pub mod leave_request;

use sqlx::{
    MySql,
    mysql::MySqlArguments,
    query::{QueryAs, QueryScalar},
};

use crate::db::leave_store::MySqlWorkflowStore;
use crate::workflow::{routing::ConfiguredRouting, service::WorkflowService};

/// The workflow as wired for the HTTP layer.
pub type LeaveService = WorkflowService<MySqlWorkflowStore, ConfiguredRouting>;

// Typed SQLx binding for dynamically built WHERE clauses
#[derive(Debug, Clone)]
pub(crate) enum FilterValue {
    U64(u64),
    I32(i32),
    Str(String),
}

pub(crate) fn bind_as<'q, O>(
    mut query: QueryAs<'q, MySql, O, MySqlArguments>,
    args: &'q [FilterValue],
) -> QueryAs<'q, MySql, O, MySqlArguments> {
    for arg in args {
        query = match arg {
            FilterValue::U64(v) => query.bind(*v),
            FilterValue::I32(v) => query.bind(*v),
            FilterValue::Str(s) => query.bind(s.as_str()),
        };
    }
    query
}

pub(crate) fn bind_scalar<'q, O>(
    mut query: QueryScalar<'q, MySql, O, MySqlArguments>,
    args: &'q [FilterValue],
) -> QueryScalar<'q, MySql, O, MySqlArguments> {
    for arg in args {
        query = match arg {
            FilterValue::U64(v) => query.bind(*v),
            FilterValue::I32(v) => query.bind(*v),
            FilterValue::Str(s) => query.bind(s.as_str()),
        };
    }
    query
}

/// Returns `(page, per_page, offset)`; pages start at 1, at most 100 per page.
pub(crate) fn page_bounds(page: Option<u32>, per_page: Option<u32>) -> (u32, u32, u64) {
    let per_page = per_page.unwrap_or(10).clamp(1, 100);
    let page = page.unwrap_or(1).max(1);
    let offset = u64::from(page - 1) * u64::from(per_page);
    (page, per_page, offset)
}

pub(crate) fn where_clause(conditions: &[&str]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}
