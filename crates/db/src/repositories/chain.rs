use chrono::Utc;
use sqlx::Row;

use hrflow_core::domain::request_type::RequestType;
use hrflow_core::workflow::{ApprovalChainCatalog, ApprovalChainStep, ApproverRule};

use super::{decode_error, parse_u32, CatalogLoadError, RepositoryError};
use crate::{begin_write, DbPool};

/// Reads and maintains the `approval_chain` / `approval_chain_step` tables.
pub struct SqlApprovalChainRepository {
    pool: DbPool,
}

impl SqlApprovalChainRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Loads every registered chain and validates it into a catalog.
    pub async fn load_catalog(&self) -> Result<ApprovalChainCatalog, CatalogLoadError> {
        let registered = sqlx::query("SELECT request_type FROM approval_chain")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| {
                let code: String = row.try_get("request_type")?;
                RequestType::parse(&code).ok_or_else(|| decode_error("request_type", code))
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        let steps = self.list_steps().await?;
        Ok(ApprovalChainCatalog::new(registered, steps)?)
    }

    pub async fn list_steps(&self) -> Result<Vec<ApprovalChainStep>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT request_type, level, rule_kind, rule_param, level_name
             FROM approval_chain_step
             ORDER BY request_type ASC, level ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let code: String = row.try_get("request_type")?;
                let request_type =
                    RequestType::parse(&code).ok_or_else(|| decode_error("request_type", &code))?;
                let kind: String = row.try_get("rule_kind")?;
                let param: Option<String> = row.try_get("rule_param")?;
                let rule = ApproverRule::from_parts(&kind, param.as_deref())
                    .map_err(|error| decode_error("rule_kind", error))?;

                Ok(ApprovalChainStep {
                    request_type,
                    level: parse_u32("level", row.try_get("level")?)?,
                    rule,
                    level_name: row.try_get("level_name")?,
                })
            })
            .collect()
    }

    /// Registers `request_type` and replaces its steps in one transaction.
    /// An empty `steps` slice registers an auto-approving chain.
    pub async fn replace_chain(
        &self,
        request_type: RequestType,
        description: Option<&str>,
        steps: &[ApprovalChainStep],
    ) -> Result<(), RepositoryError> {
        let mut tx = begin_write(&self.pool).await?;

        sqlx::query(
            "INSERT INTO approval_chain (request_type, description, created_at)
             VALUES (?, ?, ?)
             ON CONFLICT(request_type) DO UPDATE SET description = excluded.description",
        )
        .bind(request_type.as_str())
        .bind(description)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM approval_chain_step WHERE request_type = ?")
            .bind(request_type.as_str())
            .execute(&mut *tx)
            .await?;

        for step in steps {
            if step.request_type != request_type {
                return Err(RepositoryError::Decode(format!(
                    "step for {} passed while replacing {request_type}",
                    step.request_type
                )));
            }
            sqlx::query(
                "INSERT INTO approval_chain_step (request_type, level, rule_kind, rule_param, level_name)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(request_type.as_str())
            .bind(i64::from(step.level))
            .bind(step.rule.kind())
            .bind(step.rule.param())
            .bind(step.level_name.as_deref())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
