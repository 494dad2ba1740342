use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, Utc};
use sqlx::MySqlPool;

use crate::{
    api::leave_balance::YearQuery, auth::auth::AuthUser, model::holiday::Holiday,
    workflow::error::WorkflowError,
};

/// Public holidays of a year; these never count towards `days_count`.
#[utoipa::path(
    get,
    path = "/api/v1/holidays",
    params(YearQuery),
    responses(
        (status = 200, description = "Holidays ordered by date", body = [Holiday]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn list_holidays(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<YearQuery>,
) -> actix_web::Result<impl Responder> {
    let year = query.year.unwrap_or_else(|| Utc::now().year());

    let holidays = sqlx::query_as::<_, Holiday>(
        "SELECT id, name, date, description FROM holidays WHERE YEAR(date) = ? ORDER BY date",
    )
    .bind(year)
    .fetch_all(pool.get_ref())
    .await
    .map_err(WorkflowError::from)?;

    Ok(HttpResponse::Ok().json(holidays))
}
