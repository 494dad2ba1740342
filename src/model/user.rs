use serde::Serialize;

use crate::model::role::Role;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: Role,
    pub employee_id: Option<u64>,
    pub is_active: bool,
}
