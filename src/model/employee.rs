use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmployeeStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[schema(
    example = json!({
        "id": 4,
        "employee_code": "EMP004",
        "name": "Emily Davis",
        "email": "employee@company.com",
        "position": "Software Developer",
        "department_id": 1,
        "manager_id": 3,
        "joining_date": "2024-02-15",
        "status": "active"
    })
)]
pub struct Employee {
    #[schema(example = 4)]
    pub id: u64,

    #[schema(example = "EMP004")]
    pub employee_code: String,

    #[schema(example = "Emily Davis")]
    pub name: String,

    #[schema(example = "employee@company.com", nullable = true)]
    pub email: Option<String>,

    #[schema(example = "Software Developer")]
    pub position: String,

    #[schema(example = 1)]
    pub department_id: u64,

    #[schema(example = 3, nullable = true)]
    pub manager_id: Option<u64>,

    #[schema(
        example = "2024-02-15",
        value_type = String,
        format = "date"
    )]
    pub joining_date: NaiveDate,

    #[schema(example = "active")]
    pub status: EmployeeStatus,
}

impl Employee {
    pub fn is_active(&self) -> bool {
        self.status == EmployeeStatus::Active
    }
}
