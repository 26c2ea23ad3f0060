//! Audit repository (审计数据访问)

use crate::{error::AppError, models::audit::*};
use sqlx::{PgPool, Postgres, QueryBuilder};

pub struct AuditRepository {
    db: PgPool,
}

impl AuditRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 插入审计日志
    pub async fn insert_audit_log(&self, log: &AuditLog) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, entity, entity_id, action, actor_id, metadata, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(log.id)
        .bind(&log.entity)
        .bind(&log.entity_id)
        .bind(&log.action)
        .bind(&log.actor_id)
        .bind(&log.metadata)
        .bind(log.occurred_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// 查询审计日志
    pub async fn query_audit_logs(
        &self,
        filters: &AuditLogFilters,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLog>, AppError> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT id, entity, entity_id, action, actor_id, metadata, occurred_at FROM audit_logs WHERE 1=1",
        );
        push_filters(&mut query, filters);
        query
            .push(" ORDER BY occurred_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let logs = query
            .build_query_as::<AuditLog>()
            .fetch_all(&self.db)
            .await?;

        Ok(logs)
    }

    /// 统计审计日志数量
    pub async fn count_audit_logs(&self, filters: &AuditLogFilters) -> Result<i64, AppError> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM audit_logs WHERE 1=1");
        push_filters(&mut query, filters);

        let count: i64 = query.build_query_scalar().fetch_one(&self.db).await?;
        Ok(count)
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filters: &AuditLogFilters) {
    if let Some(entity) = &filters.entity {
        query.push(" AND entity = ").push_bind(entity.clone());
    }
    if let Some(entity_id) = &filters.entity_id {
        query.push(" AND entity_id = ").push_bind(entity_id.clone());
    }
    if let Some(action) = &filters.action {
        query.push(" AND action = ").push_bind(action.clone());
    }
    if let Some(actor_id) = &filters.actor_id {
        query.push(" AND actor_id = ").push_bind(actor_id.clone());
    }
    if let Some(start_time) = filters.start_time {
        query.push(" AND occurred_at >= ").push_bind(start_time);
    }
    if let Some(end_time) = filters.end_time {
        query.push(" AND occurred_at <= ").push_bind(end_time);
    }
}
