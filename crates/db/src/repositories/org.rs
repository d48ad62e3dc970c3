use sqlx::{Row, SqliteConnection};

use hrflow_core::domain::employee::{DepartmentCode, EmployeeId, ProjectCode};
use hrflow_core::workflow::InMemoryOrgDirectory;

use super::RepositoryError;
use crate::{begin_write, DbPool};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepartmentRow {
    pub code: DepartmentCode,
    pub name: String,
    pub manager_employee_no: Option<EmployeeId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectRow {
    pub code: ProjectCode,
    pub name: String,
    pub manager_employee_no: Option<EmployeeId>,
}

/// Departments, projects and role holders the approver resolver reads.
pub struct SqlOrgDirectoryRepository {
    pool: DbPool,
}

impl SqlOrgDirectoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn upsert_department(&self, department: &DepartmentRow) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO department (code, name, manager_employee_no)
             VALUES (?, ?, ?)
             ON CONFLICT(code) DO UPDATE SET
                name = excluded.name,
                manager_employee_no = excluded.manager_employee_no",
        )
        .bind(department.code.as_str())
        .bind(&department.name)
        .bind(department.manager_employee_no.as_ref().map(EmployeeId::as_str))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn upsert_project(&self, project: &ProjectRow) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO project (code, name, manager_employee_no)
             VALUES (?, ?, ?)
             ON CONFLICT(code) DO UPDATE SET
                name = excluded.name,
                manager_employee_no = excluded.manager_employee_no",
        )
        .bind(project.code.as_str())
        .bind(&project.name)
        .bind(project.manager_employee_no.as_ref().map(EmployeeId::as_str))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Adds `employee_no` to `role`. A primary holder replaces the previous
    /// primary, since resolution needs exactly one.
    pub async fn assign_role(
        &self,
        role: &str,
        employee_no: &EmployeeId,
        primary: bool,
    ) -> Result<(), RepositoryError> {
        let mut tx = begin_write(&self.pool).await?;

        if primary {
            sqlx::query("UPDATE role_holder SET is_primary = 0 WHERE role = ? AND employee_no <> ?")
                .bind(role)
                .bind(employee_no.as_str())
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            "INSERT INTO role_holder (role, employee_no, is_primary)
             VALUES (?, ?, ?)
             ON CONFLICT(role, employee_no) DO UPDATE SET is_primary = excluded.is_primary",
        )
        .bind(role)
        .bind(employee_no.as_str())
        .bind(i64::from(primary))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn snapshot(&self) -> Result<InMemoryOrgDirectory, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_directory(&mut conn).await
    }

    pub async fn holds_role(
        &self,
        employee_no: &EmployeeId,
        role: &str,
    ) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        holds_role(&mut conn, employee_no, role).await
    }
}

/// Reads the whole directory on the caller's connection so approver
/// resolution sees the same org data as the rest of the transaction.
pub(crate) async fn load_directory(
    conn: &mut SqliteConnection,
) -> Result<InMemoryOrgDirectory, RepositoryError> {
    let mut directory = InMemoryOrgDirectory::default();

    let departments = sqlx::query(
        "SELECT code, manager_employee_no FROM department WHERE manager_employee_no IS NOT NULL",
    )
    .fetch_all(&mut *conn)
    .await?;
    for row in departments {
        directory.insert_department_manager(
            DepartmentCode(row.try_get("code")?),
            EmployeeId(row.try_get("manager_employee_no")?),
        );
    }

    let projects = sqlx::query(
        "SELECT code, manager_employee_no FROM project WHERE manager_employee_no IS NOT NULL",
    )
    .fetch_all(&mut *conn)
    .await?;
    for row in projects {
        directory.insert_project_manager(
            ProjectCode(row.try_get("code")?),
            EmployeeId(row.try_get("manager_employee_no")?),
        );
    }

    let holders = sqlx::query("SELECT role, employee_no FROM role_holder WHERE is_primary = 1")
        .fetch_all(&mut *conn)
        .await?;
    for row in holders {
        let role: String = row.try_get("role")?;
        directory.insert_role_holder(&role, EmployeeId(row.try_get("employee_no")?));
    }

    Ok(directory)
}

pub(crate) async fn holds_role(
    conn: &mut SqliteConnection,
    employee_no: &EmployeeId,
    role: &str,
) -> Result<bool, RepositoryError> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS holders FROM role_holder
         WHERE employee_no = ? AND LOWER(role) = LOWER(?)",
    )
    .bind(employee_no.as_str())
    .bind(role.trim())
    .fetch_one(&mut *conn)
    .await?;

    let holders: i64 = row.try_get("holders")?;
    Ok(holders > 0)
}
