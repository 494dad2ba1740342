use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Employee,
    LineManager,
    Hr,
    Admin,
}

impl Role {
    /// Roles that can sit on an approval step.
    pub fn is_approver(&self) -> bool {
        matches!(self, Role::LineManager | Role::Hr | Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::Role;
    use std::str::FromStr;

    #[test]
    fn parses_snake_case_role_names() {
        assert_eq!(Role::from_str("line_manager").ok(), Some(Role::LineManager));
        assert_eq!(Role::Hr.as_ref(), "hr");
        assert!(Role::from_str("intern").is_err());
    }
}
