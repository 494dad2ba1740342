use std::collections::{HashMap, HashSet};

use crate::workflow::error::WorkflowError;

/// Reporting lines: employee id to optional manager id.
#[derive(Debug, Default, Clone)]
pub struct ManagerIndex {
    managers: HashMap<u64, Option<u64>>,
}

impl ManagerIndex {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u64, Option<u64>)>) -> Self {
        Self {
            managers: pairs.into_iter().collect(),
        }
    }

    pub fn manager_of(&self, employee_id: u64) -> Option<u64> {
        self.managers.get(&employee_id).copied().flatten()
    }

    pub fn direct_reports(&self, manager_id: u64) -> Vec<u64> {
        let mut reports: Vec<u64> = self
            .managers
            .iter()
            .filter(|(_, m)| **m == Some(manager_id))
            .map(|(id, _)| *id)
            .collect();
        reports.sort_unstable();
        reports
    }

    /// Checks that `employee_id` may report to `manager_id`. Walks up from the
    /// proposed manager; reaching the employee means a cycle.
    pub fn check_assignment(&self, employee_id: u64, manager_id: u64) -> Result<(), WorkflowError> {
        if !self.managers.contains_key(&employee_id) {
            return Err(WorkflowError::not_found("employee", employee_id));
        }
        if !self.managers.contains_key(&manager_id) {
            return Err(WorkflowError::not_found("employee", manager_id));
        }

        let mut seen = HashSet::new();
        let mut cursor = Some(manager_id);
        while let Some(id) = cursor {
            if id == employee_id || !seen.insert(id) {
                return Err(WorkflowError::ManagerCycle {
                    employee_id,
                    manager_id,
                });
            }
            cursor = self.manager_of(id);
        }
        Ok(())
    }

    pub fn assign(&mut self, employee_id: u64, manager_id: Option<u64>) -> Result<(), WorkflowError> {
        if let Some(manager_id) = manager_id {
            self.check_assignment(employee_id, manager_id)?;
        } else if !self.managers.contains_key(&employee_id) {
            return Err(WorkflowError::not_found("employee", employee_id));
        }
        self.managers.insert(employee_id, manager_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1 <- 2 <- 3 <- 4, and 5 unattached
    fn index() -> ManagerIndex {
        ManagerIndex::from_pairs([(1, None), (2, Some(1)), (3, Some(2)), (4, Some(3)), (5, None)])
    }

    #[test]
    fn lists_direct_reports() {
        let mut idx = index();
        idx.assign(5, Some(2)).unwrap();
        assert_eq!(idx.direct_reports(2), vec![3, 5]);
        assert_eq!(idx.direct_reports(4), Vec::<u64>::new());
        assert_eq!(idx.manager_of(5), Some(2));
    }

    #[test]
    fn rejects_self_management() {
        assert!(matches!(
            index().assign(3, Some(3)),
            Err(WorkflowError::ManagerCycle { .. })
        ));
    }

    #[test]
    fn rejects_indirect_cycle() {
        let mut idx = index();
        assert!(matches!(
            idx.assign(1, Some(4)),
            Err(WorkflowError::ManagerCycle {
                employee_id: 1,
                manager_id: 4
            })
        ));
        // unchanged
        assert_eq!(idx.manager_of(1), None);
    }

    #[test]
    fn allows_reparenting_without_cycle_and_clearing() {
        let mut idx = index();
        idx.assign(4, Some(1)).unwrap();
        assert_eq!(idx.direct_reports(1), vec![2, 4]);
        idx.assign(4, None).unwrap();
        assert_eq!(idx.manager_of(4), None);
    }

    #[test]
    fn unknown_employees_are_not_found() {
        assert!(matches!(
            index().assign(9, Some(1)),
            Err(WorkflowError::NotFound { .. })
        ));
        assert!(matches!(
            index().assign(1, Some(9)),
            Err(WorkflowError::NotFound { .. })
        ));
    }
}
