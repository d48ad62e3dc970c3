use rust_decimal::Decimal;

use hrflow_core::domain::employee::{DepartmentCode, EmployeeId, ProjectCode};
use hrflow_core::domain::request_type::RequestType;
use hrflow_core::workflow::{ApprovalChainStep, ApproverRule, OrgDirectory};

use crate::connection::DbPool;
use crate::repositories::{
    CatalogLoadError, DepartmentRow, ProjectRow, RepositoryError, SqlApprovalChainRepository,
    SqlHrLedgerRepository, SqlOrgDirectoryRepository,
};

#[derive(Clone, Copy)]
enum SeedRule {
    DepartmentManager,
    ProjectManager,
    Role(&'static str),
}

struct SeedChainContract {
    request_type: RequestType,
    description: &'static str,
    levels: &'static [(SeedRule, &'static str)],
}

/// Demo approval chains, one per request type.
const SEED_CHAINS: &[SeedChainContract] = &[
    SeedChainContract {
        request_type: RequestType::Leave,
        description: "Leave: project manager then HR",
        levels: &[
            (SeedRule::ProjectManager, "Project Manager"),
            (SeedRule::Role("HR_MANAGER"), "HR Manager"),
        ],
    },
    SeedChainContract {
        request_type: RequestType::Loan,
        description: "Loan: finance sign-off",
        levels: &[(SeedRule::Role("FINANCE_MANAGER"), "Finance Manager")],
    },
    SeedChainContract {
        request_type: RequestType::LoanPostponement,
        description: "Loan postponement: department manager then finance",
        levels: &[
            (SeedRule::DepartmentManager, "Department Manager"),
            (SeedRule::Role("FINANCE_MANAGER"), "Finance Manager"),
        ],
    },
    SeedChainContract {
        request_type: RequestType::Allowance,
        description: "Allowance: department manager then HR",
        levels: &[
            (SeedRule::DepartmentManager, "Department Manager"),
            (SeedRule::Role("HR_MANAGER"), "HR Manager"),
        ],
    },
    SeedChainContract {
        request_type: RequestType::Payroll,
        description: "Payroll: HR then finance",
        levels: &[
            (SeedRule::Role("HR_MANAGER"), "HR Manager"),
            (SeedRule::Role("FINANCE_MANAGER"), "Finance Manager"),
        ],
    },
    SeedChainContract {
        request_type: RequestType::ManualAttendance,
        description: "Manual attendance: project manager",
        levels: &[(SeedRule::ProjectManager, "Project Manager")],
    },
    SeedChainContract {
        request_type: RequestType::LaborRequest,
        description: "Labor request: requesting project manager then HR",
        levels: &[
            (SeedRule::ProjectManager, "Project Manager"),
            (SeedRule::Role("HR_MANAGER"), "HR Manager"),
        ],
    },
    SeedChainContract {
        request_type: RequestType::ProjectTransfer,
        description: "Project transfer: source PM, destination PM, then HR",
        levels: &[
            (SeedRule::ProjectManager, "Source Project Manager"),
            (SeedRule::ProjectManager, "Destination Project Manager"),
            (SeedRule::Role("HR_MANAGER"), "HR Manager"),
        ],
    },
];

const SEED_DEPARTMENTS: &[(&str, &str, &str)] =
    &[("5", "Operations", "DM-5"), ("7", "Finance", "DM-7")];

const SEED_PROJECTS: &[(&str, &str, &str)] =
    &[("9", "Harbour Tower", "PM-9"), ("12", "Ring Road Extension", "PM-12")];

const SEED_ROLES: &[(&str, &str)] =
    &[("HR_MANAGER", "HR-1"), ("FINANCE_MANAGER", "FIN-1"), ("ADMIN", "ADM-1")];

const SEED_LEAVE_BALANCES: &[(&str, &str, i64)] =
    &[("100", "annual", 21), ("101", "annual", 14), ("100", "sick", 10)];

impl SeedChainContract {
    fn steps(&self) -> Vec<ApprovalChainStep> {
        self.levels
            .iter()
            .zip(1u32..)
            .map(|((rule, name), level)| ApprovalChainStep {
                request_type: self.request_type,
                level,
                rule: match rule {
                    SeedRule::DepartmentManager => ApproverRule::DepartmentManager,
                    SeedRule::ProjectManager => ApproverRule::ProjectManager,
                    SeedRule::Role(role) => ApproverRule::RoleHolder((*role).to_string()),
                },
                level_name: Some((*name).to_string()),
            })
            .collect()
    }
}

/// Demo org directory, chains and leave balances for local runs.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    /// Loads the dataset. Safe to run repeatedly.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let org = SqlOrgDirectoryRepository::new(pool.clone());
        for (code, name, manager) in SEED_DEPARTMENTS {
            org.upsert_department(&DepartmentRow {
                code: DepartmentCode::new(*code),
                name: (*name).to_string(),
                manager_employee_no: Some(EmployeeId::new(*manager)),
            })
            .await?;
        }
        for (code, name, manager) in SEED_PROJECTS {
            org.upsert_project(&ProjectRow {
                code: ProjectCode::new(*code),
                name: (*name).to_string(),
                manager_employee_no: Some(EmployeeId::new(*manager)),
            })
            .await?;
        }
        for (role, holder) in SEED_ROLES {
            org.assign_role(role, &EmployeeId::new(*holder), true).await?;
        }

        let chains = SqlApprovalChainRepository::new(pool.clone());
        let mut chains_seeded = Vec::with_capacity(SEED_CHAINS.len());
        for contract in SEED_CHAINS {
            chains
                .replace_chain(contract.request_type, Some(contract.description), &contract.steps())
                .await?;
            chains_seeded.push(ChainSeedInfo {
                request_type: contract.request_type,
                levels: contract.levels.len(),
                description: contract.description,
            });
        }

        let ledger = SqlHrLedgerRepository::new(pool.clone());
        for (employee, leave_type, days) in SEED_LEAVE_BALANCES {
            ledger
                .set_leave_balance(&EmployeeId::new(*employee), leave_type, Decimal::from(*days))
                .await?;
        }

        Ok(SeedResult {
            chains_seeded,
            departments: SEED_DEPARTMENTS.len(),
            projects: SEED_PROJECTS.len(),
            role_holders: SEED_ROLES.len(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, CatalogLoadError> {
        let catalog = SqlApprovalChainRepository::new(pool.clone()).load_catalog().await?;
        let directory = SqlOrgDirectoryRepository::new(pool.clone()).snapshot().await?;

        let mut checks = vec![(
            "every request type has a chain",
            catalog.ensure_covers(&RequestType::ALL).is_ok(),
        )];
        checks.push((
            "chain lengths match the seed",
            SEED_CHAINS.iter().all(|contract| {
                catalog.chain_length(contract.request_type) == Some(contract.levels.len())
            }),
        ));
        checks.push((
            "every seeded role has a primary holder",
            SEED_ROLES.iter().all(|(role, holder)| {
                directory.role_holder(role) == Some(EmployeeId::new(*holder))
            }),
        ));
        checks.push((
            "every seeded project has a manager",
            SEED_PROJECTS.iter().all(|(code, _, manager)| {
                directory.project_manager(&ProjectCode::new(*code)) == Some(EmployeeId::new(*manager))
            }),
        ));

        Ok(VerificationResult { all_present: checks.iter().all(|(_, ok)| *ok), checks })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub chains_seeded: Vec<ChainSeedInfo>,
    pub departments: usize,
    pub projects: usize,
    pub role_holders: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainSeedInfo {
    pub request_type: RequestType,
    pub levels: usize,
    pub description: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
