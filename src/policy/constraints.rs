//! 软删除一致性约束的启动引导
//!
//! 对每个纳入管控的表：先修正已有的不一致数据，再以幂等方式安装
//! `is_active = NOT COALESCE(is_deleted, false)` 的 CHECK 约束，
//! 保证绕过应用层写入（原生 SQL、迁移脚本）时不变量依然成立。

use crate::{models::EntityKind, policy::SoftDeletePolicy};
use serde::Serialize;
use sqlx::PgPool;

/// 单步失败记录
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapFailure {
    pub table: String,
    pub step: &'static str,
    pub message: String,
}

/// 启动引导结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct BootstrapReport {
    pub normalized_rows: u64,
    pub installed: Vec<String>,
    pub already_present: Vec<String>,
    pub failures: Vec<BootstrapFailure>,
}

impl BootstrapReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 严格模式下第一处失败即中止
#[derive(Debug, thiserror::Error)]
#[error("consistency bootstrap failed on {table} ({step}): {source}")]
pub struct BootstrapError {
    pub table: String,
    pub step: &'static str,
    #[source]
    pub source: sqlx::Error,
}

pub fn constraint_name(entity: EntityKind) -> String {
    format!("{}_active_not_deleted_chk", entity.table())
}

pub fn normalize_sql(entity: EntityKind) -> String {
    format!(
        "UPDATE {table} \
         SET is_deleted = COALESCE(is_deleted, false), \
             is_active = NOT COALESCE(is_deleted, false) \
         WHERE is_deleted IS NULL \
            OR is_active IS DISTINCT FROM NOT COALESCE(is_deleted, false)",
        table = entity.table()
    )
}

pub fn add_constraint_sql(entity: EntityKind) -> String {
    format!(
        "ALTER TABLE {table} ADD CONSTRAINT {name} \
         CHECK (is_active = NOT COALESCE(is_deleted, false)) NOT VALID",
        table = entity.table(),
        name = constraint_name(entity)
    )
}

pub fn validate_constraint_sql(entity: EntityKind) -> String {
    format!(
        "ALTER TABLE {table} VALIDATE CONSTRAINT {name}",
        table = entity.table(),
        name = constraint_name(entity)
    )
}

const CONSTRAINT_EXISTS_SQL: &str = "SELECT EXISTS (\
     SELECT 1 FROM pg_constraint WHERE conname = $1 AND conrelid = $2::regclass\
 )";

/// 启动时执行一次，串行、不可重入
pub struct ConsistencyBootstrap<'a> {
    pool: &'a PgPool,
    policy: &'a SoftDeletePolicy,
    strict: bool,
}

impl<'a> ConsistencyBootstrap<'a> {
    pub fn new(pool: &'a PgPool, policy: &'a SoftDeletePolicy, strict: bool) -> Self {
        Self {
            pool,
            policy,
            strict,
        }
    }

    /// 默认失败放行：记录警告后继续；`strict` 时返回第一处错误
    pub async fn run(&self) -> Result<BootstrapReport, BootstrapError> {
        let mut report = BootstrapReport::default();

        for entity in self.policy.enforced() {
            if let Err((step, source)) = self.bootstrap_table(entity, &mut report).await {
                if self.strict {
                    tracing::error!(table = %entity, step, error = %source, "Consistency bootstrap failed");
                    return Err(BootstrapError {
                        table: entity.table().to_string(),
                        step,
                        source,
                    });
                }

                tracing::warn!(
                    table = %entity,
                    step,
                    error = %source,
                    "Consistency bootstrap step failed, continuing"
                );
                report.failures.push(BootstrapFailure {
                    table: entity.table().to_string(),
                    step,
                    message: source.to_string(),
                });
            }
        }

        tracing::info!(
            normalized_rows = report.normalized_rows,
            installed = report.installed.len(),
            already_present = report.already_present.len(),
            failures = report.failures.len(),
            "Consistency bootstrap finished"
        );

        Ok(report)
    }

    async fn bootstrap_table(
        &self,
        entity: EntityKind,
        report: &mut BootstrapReport,
    ) -> Result<(), (&'static str, sqlx::Error)> {
        let normalized = sqlx::query(&normalize_sql(entity))
            .execute(self.pool)
            .await
            .map_err(|e| ("normalize", e))?
            .rows_affected();

        if normalized > 0 {
            tracing::warn!(table = %entity, rows = normalized, "Normalized inconsistent soft-delete rows");
            metrics::counter!("consistency_normalized_rows_total", "table" => entity.table())
                .increment(normalized);
        }
        report.normalized_rows += normalized;

        let name = constraint_name(entity);
        let exists: bool = sqlx::query_scalar(CONSTRAINT_EXISTS_SQL)
            .bind(&name)
            .bind(entity.table())
            .fetch_one(self.pool)
            .await
            .map_err(|e| ("lookup", e))?;

        if exists {
            tracing::debug!(table = %entity, constraint = %name, "Constraint already present");
            report.already_present.push(name);
            return Ok(());
        }

        sqlx::query(&add_constraint_sql(entity))
            .execute(self.pool)
            .await
            .map_err(|e| ("install", e))?;

        sqlx::query(&validate_constraint_sql(entity))
            .execute(self.pool)
            .await
            .map_err(|e| ("validate", e))?;

        tracing::info!(table = %entity, constraint = %name, "Constraint installed");
        report.installed.push(name);
        Ok(())
    }
}
