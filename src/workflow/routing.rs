use std::collections::HashMap;
use std::str::FromStr;

use crate::model::{leave_request::LeaveType, role::Role};
use crate::workflow::error::WorkflowError;

/// Source of the ordered approver roles for a new request.
pub trait ApprovalRouting {
    fn roles_for(&self, leave_type: LeaveType, department_id: u64) -> Vec<Role>;
}

/// Role sequences read from configuration. A leave type override wins over
/// a department override, which wins over the default chain.
#[derive(Debug, Clone)]
pub struct ConfiguredRouting {
    default: Vec<Role>,
    by_type: HashMap<LeaveType, Vec<Role>>,
    by_department: HashMap<u64, Vec<Role>>,
}

fn parse_roles(list: &str) -> Result<Vec<Role>, WorkflowError> {
    let roles = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Role::from_str(s)
                .map_err(|_| WorkflowError::Configuration(format!("unknown approver role `{}`", s)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if roles.is_empty() {
        return Err(WorkflowError::Configuration(format!(
            "empty approval chain `{}`",
            list
        )));
    }
    if let Some(role) = roles.iter().find(|r| !r.is_approver()) {
        return Err(WorkflowError::Configuration(format!(
            "role `{}` cannot approve leave",
            role
        )));
    }
    Ok(roles)
}

/// Parses `key=role,role;key=role` into a map.
fn parse_overrides<K, F>(raw: &str, parse_key: F) -> Result<HashMap<K, Vec<Role>>, WorkflowError>
where
    K: std::hash::Hash + Eq,
    F: Fn(&str) -> Option<K>,
{
    let mut map = HashMap::new();
    for entry in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let (key, roles) = entry.split_once('=').ok_or_else(|| {
            WorkflowError::Configuration(format!("approval chain entry `{}` has no `=`", entry))
        })?;
        let key = parse_key(key.trim()).ok_or_else(|| {
            WorkflowError::Configuration(format!("unknown approval chain key `{}`", key.trim()))
        })?;
        map.insert(key, parse_roles(roles)?);
    }
    Ok(map)
}

impl ConfiguredRouting {
    pub fn new(default: Vec<Role>) -> Self {
        Self {
            default,
            by_type: HashMap::new(),
            by_department: HashMap::new(),
        }
    }

    pub fn with_type(mut self, leave_type: LeaveType, roles: Vec<Role>) -> Self {
        self.by_type.insert(leave_type, roles);
        self
    }

    pub fn parse(default: &str, by_type: &str, by_department: &str) -> Result<Self, WorkflowError> {
        Ok(Self {
            default: parse_roles(default)?,
            by_type: parse_overrides(by_type, |k| LeaveType::from_str(k).ok())?,
            by_department: parse_overrides(by_department, |k| k.parse::<u64>().ok())?,
        })
    }
}

impl ApprovalRouting for ConfiguredRouting {
    fn roles_for(&self, leave_type: LeaveType, department_id: u64) -> Vec<Role> {
        self.by_type
            .get(&leave_type)
            .or_else(|| self.by_department.get(&department_id))
            .unwrap_or(&self.default)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_and_overrides() {
        let routing = ConfiguredRouting::parse(
            "line_manager, hr",
            "sick=line_manager;maternity=line_manager,hr,admin",
            "2=hr",
        )
        .unwrap();

        assert_eq!(
            routing.roles_for(LeaveType::Casual, 1),
            vec![Role::LineManager, Role::Hr]
        );
        assert_eq!(routing.roles_for(LeaveType::Sick, 2), vec![Role::LineManager]);
        assert_eq!(routing.roles_for(LeaveType::Paid, 2), vec![Role::Hr]);
        assert_eq!(routing.roles_for(LeaveType::Maternity, 1).len(), 3);
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(ConfiguredRouting::parse("", "", "").is_err());
        assert!(ConfiguredRouting::parse("line_manager,ceo", "", "").is_err());
        assert!(ConfiguredRouting::parse("employee", "", "").is_err());
        assert!(ConfiguredRouting::parse("hr", "holiday=hr", "").is_err());
        assert!(ConfiguredRouting::parse("hr", "sick", "").is_err());
        assert!(ConfiguredRouting::parse("hr", "", "eng=hr").is_err());
    }
}
