use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::domain::approval::RequestContext;
use crate::domain::employee::{DepartmentCode, EmployeeId, ProjectCode};
use crate::workflow::chain::ApproverRule;

/// Organizational lookups the resolver needs.
pub trait OrgDirectory: Send + Sync {
    fn department_manager(&self, department: &DepartmentCode) -> Option<EmployeeId>;
    fn project_manager(&self, project: &ProjectCode) -> Option<EmployeeId>;
    fn role_holder(&self, role: &str) -> Option<EmployeeId>;
}

impl<T> OrgDirectory for &T
where
    T: OrgDirectory + ?Sized,
{
    fn department_manager(&self, department: &DepartmentCode) -> Option<EmployeeId> {
        (**self).department_manager(department)
    }

    fn project_manager(&self, project: &ProjectCode) -> Option<EmployeeId> {
        (**self).project_manager(project)
    }

    fn role_holder(&self, role: &str) -> Option<EmployeeId> {
        (**self).role_holder(role)
    }
}

impl<T> OrgDirectory for Arc<T>
where
    T: OrgDirectory + ?Sized,
{
    fn department_manager(&self, department: &DepartmentCode) -> Option<EmployeeId> {
        (**self).department_manager(department)
    }

    fn project_manager(&self, project: &ProjectCode) -> Option<EmployeeId> {
        (**self).project_manager(project)
    }

    fn role_holder(&self, role: &str) -> Option<EmployeeId> {
        (**self).role_holder(role)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InMemoryOrgDirectory {
    department_managers: HashMap<String, EmployeeId>,
    project_managers: HashMap<String, EmployeeId>,
    role_holders: HashMap<String, EmployeeId>,
}

impl InMemoryOrgDirectory {
    pub fn with_department_manager(
        mut self,
        department: impl Into<String>,
        manager: impl Into<String>,
    ) -> Self {
        self.insert_department_manager(DepartmentCode(department.into()), EmployeeId(manager.into()));
        self
    }

    pub fn with_project_manager(
        mut self,
        project: impl Into<String>,
        manager: impl Into<String>,
    ) -> Self {
        self.insert_project_manager(ProjectCode(project.into()), EmployeeId(manager.into()));
        self
    }

    pub fn with_role_holder(mut self, role: impl Into<String>, holder: impl Into<String>) -> Self {
        self.insert_role_holder(&role.into(), EmployeeId(holder.into()));
        self
    }

    pub fn insert_department_manager(&mut self, department: DepartmentCode, manager: EmployeeId) {
        self.department_managers.insert(normalize_key(&department.0), manager);
    }

    pub fn insert_project_manager(&mut self, project: ProjectCode, manager: EmployeeId) {
        self.project_managers.insert(normalize_key(&project.0), manager);
    }

    pub fn insert_role_holder(&mut self, role: &str, holder: EmployeeId) {
        self.role_holders.insert(normalize_key(role), holder);
    }
}

impl OrgDirectory for InMemoryOrgDirectory {
    fn department_manager(&self, department: &DepartmentCode) -> Option<EmployeeId> {
        self.department_managers.get(&normalize_key(&department.0)).cloned()
    }

    fn project_manager(&self, project: &ProjectCode) -> Option<EmployeeId> {
        self.project_managers.get(&normalize_key(&project.0)).cloned()
    }

    fn role_holder(&self, role: &str) -> Option<EmployeeId> {
        self.role_holders.get(&normalize_key(role)).cloned()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ResolutionFailure {
    #[error("request has no department code for a department-manager rule")]
    MissingDepartmentCode,
    #[error("department `{department}` has no configured manager")]
    NoDepartmentManager { department: DepartmentCode },
    #[error("request has no project code for a project-manager rule")]
    MissingProjectCode,
    #[error("project `{project}` has no configured manager")]
    NoProjectManager { project: ProjectCode },
    #[error("role `{role}` has no holder")]
    NoRoleHolder { role: String },
    #[error("fixed approver rule has an empty employee id")]
    EmptyFixedEmployee,
}

#[derive(Clone, Debug)]
pub struct ApproverResolver<D> {
    directory: D,
}

impl<D> ApproverResolver<D>
where
    D: OrgDirectory,
{
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Computes the one employee who must act on `rule` for `context`.
    pub fn resolve(
        &self,
        rule: &ApproverRule,
        context: &RequestContext,
    ) -> Result<EmployeeId, ResolutionFailure> {
        match rule {
            ApproverRule::FixedEmployee(employee) => {
                if employee.0.trim().is_empty() {
                    return Err(ResolutionFailure::EmptyFixedEmployee);
                }
                Ok(employee.clone())
            }
            ApproverRule::DepartmentManager => {
                let department =
                    context.department_code.as_ref().ok_or(ResolutionFailure::MissingDepartmentCode)?;
                self.directory.department_manager(department).ok_or_else(|| {
                    ResolutionFailure::NoDepartmentManager { department: department.clone() }
                })
            }
            ApproverRule::ProjectManager => {
                let project =
                    context.project_code.as_ref().ok_or(ResolutionFailure::MissingProjectCode)?;
                self.directory
                    .project_manager(project)
                    .ok_or_else(|| ResolutionFailure::NoProjectManager { project: project.clone() })
            }
            ApproverRule::RoleHolder(role) => self
                .directory
                .role_holder(role)
                .ok_or_else(|| ResolutionFailure::NoRoleHolder { role: role.clone() }),
        }
    }
}

fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{ApproverResolver, InMemoryOrgDirectory, ResolutionFailure};
    use crate::domain::approval::RequestContext;
    use crate::domain::employee::{DepartmentCode, EmployeeId, ProjectCode};
    use crate::domain::request_type::RequestType;
    use crate::workflow::chain::ApproverRule;

    fn directory() -> InMemoryOrgDirectory {
        InMemoryOrgDirectory::default()
            .with_department_manager("5", "DM-5")
            .with_project_manager("9", "PM-9")
            .with_role_holder("HR_MANAGER", "HR-1")
    }

    fn context(department: Option<&str>, project: Option<&str>) -> RequestContext {
        RequestContext::new(
            RequestType::Leave,
            EmployeeId::new("100"),
            department.map(DepartmentCode::new),
            project.map(ProjectCode::new),
        )
    }

    #[test]
    fn resolves_each_rule_kind() {
        let resolver = ApproverResolver::new(directory());
        let ctx = context(Some("5"), Some("9"));

        assert_eq!(resolver.resolve(&ApproverRule::DepartmentManager, &ctx), Ok(EmployeeId::new("DM-5")));
        assert_eq!(resolver.resolve(&ApproverRule::ProjectManager, &ctx), Ok(EmployeeId::new("PM-9")));
        assert_eq!(
            resolver.resolve(&ApproverRule::RoleHolder("hr_manager".into()), &ctx),
            Ok(EmployeeId::new("HR-1"))
        );
        assert_eq!(
            resolver.resolve(&ApproverRule::FixedEmployee(EmployeeId::new("CEO")), &ctx),
            Ok(EmployeeId::new("CEO"))
        );
    }

    #[test]
    fn missing_department_manager_is_an_explicit_failure() {
        let resolver = ApproverResolver::new(directory());

        assert_eq!(
            resolver.resolve(&ApproverRule::DepartmentManager, &context(Some("7"), None)),
            Err(ResolutionFailure::NoDepartmentManager { department: DepartmentCode::new("7") })
        );
        assert_eq!(
            resolver.resolve(&ApproverRule::DepartmentManager, &context(None, None)),
            Err(ResolutionFailure::MissingDepartmentCode)
        );
    }

    #[test]
    fn missing_project_or_role_fails() {
        let resolver = ApproverResolver::new(directory());

        assert_eq!(
            resolver.resolve(&ApproverRule::ProjectManager, &context(Some("5"), None)),
            Err(ResolutionFailure::MissingProjectCode)
        );
        assert!(matches!(
            resolver.resolve(&ApproverRule::RoleHolder("CFO".into()), &context(None, None)),
            Err(ResolutionFailure::NoRoleHolder { .. })
        ));
    }
}
