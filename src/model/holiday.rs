use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Holiday {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Christmas Day")]
    pub name: String,
    #[schema(example = "2026-12-25", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(nullable = true)]
    pub description: Option<String>,
}
