use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::employee::EmployeeId;
use crate::domain::request_type::RequestType;
use crate::workflow::engine::ApprovalError;

/// How the approver of one level is computed from a request context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "param", rename_all = "snake_case")]
pub enum ApproverRule {
    FixedEmployee(EmployeeId),
    DepartmentManager,
    ProjectManager,
    RoleHolder(String),
}

impl ApproverRule {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FixedEmployee(_) => "fixed_employee",
            Self::DepartmentManager => "department_manager",
            Self::ProjectManager => "project_manager",
            Self::RoleHolder(_) => "role_holder",
        }
    }

    pub fn param(&self) -> Option<&str> {
        match self {
            Self::FixedEmployee(employee) => Some(employee.as_str()),
            Self::RoleHolder(role) => Some(role),
            Self::DepartmentManager | Self::ProjectManager => None,
        }
    }

    /// Decodes the `(rule_kind, rule_param)` column pair of a stored step.
    pub fn from_parts(kind: &str, param: Option<&str>) -> Result<Self, String> {
        let param = param.map(str::trim).filter(|value| !value.is_empty());
        match (kind.trim().to_ascii_lowercase().as_str(), param) {
            ("fixed_employee", Some(employee)) => Ok(Self::FixedEmployee(EmployeeId::new(employee))),
            ("fixed_employee", None) => Err("fixed_employee rule needs an employee id".to_string()),
            ("department_manager", _) => Ok(Self::DepartmentManager),
            ("project_manager", _) => Ok(Self::ProjectManager),
            ("role_holder", Some(role)) => Ok(Self::RoleHolder(role.to_string())),
            ("role_holder", None) => Err("role_holder rule needs a role".to_string()),
            (other, _) => Err(format!("unknown approver rule `{other}`")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalChainStep {
    pub request_type: RequestType,
    pub level: u32,
    pub rule: ApproverRule,
    pub level_name: Option<String>,
}

/// Read-only lookup of configured approval chains.
///
/// `is_configured` distinguishes "no chain at all" (an error) from "chain
/// without this level" (the chain ended, or auto-approval at level 1).
pub trait ApprovalChainConfig: Send + Sync {
    fn is_configured(&self, request_type: RequestType) -> bool;
    fn lookup(&self, request_type: RequestType, level: u32) -> Option<&ApprovalChainStep>;
}

impl<T> ApprovalChainConfig for &T
where
    T: ApprovalChainConfig + ?Sized,
{
    fn is_configured(&self, request_type: RequestType) -> bool {
        (**self).is_configured(request_type)
    }

    fn lookup(&self, request_type: RequestType, level: u32) -> Option<&ApprovalChainStep> {
        (**self).lookup(request_type, level)
    }
}

impl<T> ApprovalChainConfig for Arc<T>
where
    T: ApprovalChainConfig + ?Sized,
{
    fn is_configured(&self, request_type: RequestType) -> bool {
        (**self).is_configured(request_type)
    }

    fn lookup(&self, request_type: RequestType, level: u32) -> Option<&ApprovalChainStep> {
        (**self).lookup(request_type, level)
    }
}

/// Validated in-memory snapshot of every configured chain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApprovalChainCatalog {
    chains: BTreeMap<RequestType, Vec<ApprovalChainStep>>,
}

impl ApprovalChainCatalog {
    /// Builds the catalog from the registered request types and their steps.
    ///
    /// A registered type without steps auto-approves on submission. Steps must
    /// form the contiguous sequence `1..=N`; a gap would end the chain early.
    pub fn new(
        registered: impl IntoIterator<Item = RequestType>,
        steps: Vec<ApprovalChainStep>,
    ) -> Result<Self, ApprovalError> {
        let mut chains: BTreeMap<RequestType, Vec<ApprovalChainStep>> =
            registered.into_iter().map(|request_type| (request_type, Vec::new())).collect();

        for step in steps {
            let Some(chain) = chains.get_mut(&step.request_type) else {
                return Err(ApprovalError::InvalidChain {
                    request_type: step.request_type,
                    reason: format!("level {} defined for an unregistered request type", step.level),
                });
            };
            chain.push(step);
        }

        for (request_type, chain) in &mut chains {
            chain.sort_by_key(|step| step.level);
            let mut seen = BTreeSet::new();
            for (index, step) in chain.iter().enumerate() {
                if !seen.insert(step.level) {
                    return Err(ApprovalError::InvalidChain {
                        request_type: *request_type,
                        reason: format!("level {} is defined more than once", step.level),
                    });
                }
                let expected = index as u32 + 1;
                if step.level != expected {
                    return Err(ApprovalError::InvalidChain {
                        request_type: *request_type,
                        reason: format!("expected level {expected} but found level {}", step.level),
                    });
                }
            }
        }

        Ok(Self { chains })
    }

    /// Fails with `ConfigNotFound` for the first required type lacking a chain.
    pub fn ensure_covers(&self, required: &[RequestType]) -> Result<(), ApprovalError> {
        match required.iter().find(|request_type| !self.chains.contains_key(request_type)) {
            Some(request_type) => Err(ApprovalError::ConfigNotFound { request_type: *request_type }),
            None => Ok(()),
        }
    }

    pub fn chain_length(&self, request_type: RequestType) -> Option<usize> {
        self.chains.get(&request_type).map(Vec::len)
    }

    pub fn steps(&self, request_type: RequestType) -> &[ApprovalChainStep] {
        self.chains.get(&request_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn request_types(&self) -> impl Iterator<Item = RequestType> + '_ {
        self.chains.keys().copied()
    }
}

impl ApprovalChainConfig for ApprovalChainCatalog {
    fn is_configured(&self, request_type: RequestType) -> bool {
        self.chains.contains_key(&request_type)
    }

    fn lookup(&self, request_type: RequestType, level: u32) -> Option<&ApprovalChainStep> {
        let index = usize::try_from(level.checked_sub(1)?).ok()?;
        self.chains.get(&request_type)?.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::{ApprovalChainCatalog, ApprovalChainConfig, ApprovalChainStep, ApproverRule};
    use crate::domain::employee::EmployeeId;
    use crate::domain::request_type::RequestType;
    use crate::workflow::engine::ApprovalError;

    fn step(request_type: RequestType, level: u32, rule: ApproverRule) -> ApprovalChainStep {
        ApprovalChainStep { request_type, level, rule, level_name: None }
    }

    #[test]
    fn lookup_returns_configured_levels_only() {
        let catalog = ApprovalChainCatalog::new(
            [RequestType::Leave],
            vec![
                step(RequestType::Leave, 2, ApproverRule::RoleHolder("HR_MANAGER".into())),
                step(RequestType::Leave, 1, ApproverRule::ProjectManager),
            ],
        )
        .expect("valid catalog");

        assert_eq!(
            catalog.lookup(RequestType::Leave, 1).map(|step| &step.rule),
            Some(&ApproverRule::ProjectManager)
        );
        assert!(catalog.lookup(RequestType::Leave, 2).is_some());
        assert!(catalog.lookup(RequestType::Leave, 3).is_none());
        assert!(catalog.lookup(RequestType::Leave, 0).is_none());
        assert!(!catalog.is_configured(RequestType::Loan));
    }

    #[test]
    fn gaps_in_levels_are_rejected() {
        let error = ApprovalChainCatalog::new(
            [RequestType::Loan],
            vec![
                step(RequestType::Loan, 1, ApproverRule::DepartmentManager),
                step(RequestType::Loan, 3, ApproverRule::RoleHolder("CFO".into())),
            ],
        )
        .expect_err("level 2 is missing");

        assert!(matches!(
            error,
            ApprovalError::InvalidChain { request_type: RequestType::Loan, .. }
        ));
    }

    #[test]
    fn duplicate_levels_are_rejected() {
        let error = ApprovalChainCatalog::new(
            [RequestType::Payroll],
            vec![
                step(RequestType::Payroll, 1, ApproverRule::DepartmentManager),
                step(RequestType::Payroll, 1, ApproverRule::ProjectManager),
            ],
        )
        .expect_err("duplicate level");

        assert!(matches!(error, ApprovalError::InvalidChain { .. }));
    }

    #[test]
    fn steps_for_unregistered_types_are_rejected() {
        let error = ApprovalChainCatalog::new(
            [RequestType::Leave],
            vec![step(
                RequestType::Loan,
                1,
                ApproverRule::FixedEmployee(EmployeeId::new("FIN-1")),
            )],
        )
        .expect_err("loan is not registered");

        assert!(matches!(error, ApprovalError::InvalidChain { request_type: RequestType::Loan, .. }));
    }

    #[test]
    fn coverage_check_reports_missing_request_type() {
        let catalog = ApprovalChainCatalog::new([RequestType::Allowance], Vec::new())
            .expect("auto-approve chain");

        assert!(catalog.ensure_covers(&[RequestType::Allowance]).is_ok());
        assert_eq!(
            catalog.ensure_covers(&[RequestType::Allowance, RequestType::Payroll]),
            Err(ApprovalError::ConfigNotFound { request_type: RequestType::Payroll })
        );
        assert_eq!(catalog.chain_length(RequestType::Allowance), Some(0));
    }

    #[test]
    fn rule_parts_decode_and_reject_missing_params() {
        assert_eq!(
            ApproverRule::from_parts("ROLE_HOLDER", Some("HR_MANAGER")),
            Ok(ApproverRule::RoleHolder("HR_MANAGER".to_string()))
        );
        assert!(ApproverRule::from_parts("fixed_employee", Some("  ")).is_err());
        assert!(ApproverRule::from_parts("line_manager", None).is_err());
    }
}
