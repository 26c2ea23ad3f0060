//! 审计日志服务

use crate::{error::AppError, models::audit::*, repository::AuditRepository};
use axum::http::Method;
use sqlx::PgPool;
use uuid::Uuid;

/// 审计操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Restore,
    Purge,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Restore => "restore",
            AuditAction::Purge => "purge",
        }
    }

    /// 由请求方法与路径推断；非变更请求返回 None
    pub fn from_request(method: &Method, path: &str) -> Option<Self> {
        let last = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
        match *method {
            Method::POST if last == "restore" => Some(AuditAction::Restore),
            Method::POST => Some(AuditAction::Create),
            Method::PUT | Method::PATCH => Some(AuditAction::Update),
            Method::DELETE if last == "purge" => Some(AuditAction::Purge),
            Method::DELETE => Some(AuditAction::Delete),
            _ => None,
        }
    }
}

/// 新建记录的主键，由创建接口放入响应扩展，供审计留痕使用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecordId(pub String);

impl AuditRecordId {
    /// 取记录 JSON 中的 `id`
    pub fn from_record(record: &serde_json::Value) -> Option<Self> {
        record
            .get("id")
            .and_then(serde_json::Value::as_str)
            .map(|id| AuditRecordId(id.to_string()))
    }
}

pub struct AuditService {
    db: PgPool,
}

impl AuditService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 记录审计日志条目
    pub async fn log(
        &self,
        entity: &str,
        entity_id: Option<&str>,
        action: &str,
        actor_id: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), AppError> {
        let log = AuditLog {
            id: Uuid::new_v4(),
            entity: entity.to_string(),
            entity_id: entity_id.map(|s| s.to_string()),
            action: action.to_string(),
            actor_id: actor_id.map(|s| s.to_string()),
            metadata,
            occurred_at: chrono::Utc::now(),
        };

        let repo = AuditRepository::new(self.db.clone());
        repo.insert_audit_log(&log).await
    }

    /// 尽力而为：失败只记录日志，不影响原请求
    pub async fn record(
        &self,
        entity: &str,
        entity_id: Option<&str>,
        action: AuditAction,
        actor_id: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) {
        if let Err(e) = self
            .log(entity, entity_id, action.as_str(), actor_id, metadata)
            .await
        {
            metrics::counter!("audit_log_failures_total").increment(1);
            tracing::warn!(
                entity = %entity,
                action = action.as_str(),
                error = %e,
                "Failed to write audit log"
            );
        }
    }

    /// 查询审计日志
    pub async fn query_logs(
        &self,
        filters: &AuditLogFilters,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLog>, AppError> {
        let repo = AuditRepository::new(self.db.clone());
        repo.query_audit_logs(filters, limit, offset).await
    }

    /// 查询审计日志数量
    pub async fn count_logs(&self, filters: &AuditLogFilters) -> Result<i64, AppError> {
        let repo = AuditRepository::new(self.db.clone());
        repo.count_audit_logs(filters).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_from_created_row() {
        let row = serde_json::json!({"id": "a1b2", "name": "Solitaire"});
        assert_eq!(AuditRecordId::from_record(&row), Some(AuditRecordId("a1b2".to_string())));
        assert_eq!(AuditRecordId::from_record(&serde_json::json!({"name": "x"})), None);
    }

    #[test]
    fn test_action_from_request() {
        assert_eq!(
            AuditAction::from_request(&Method::POST, "/api/v1/records/products"),
            Some(AuditAction::Create)
        );
        assert_eq!(
            AuditAction::from_request(&Method::POST, "/api/v1/users/abc/restore"),
            Some(AuditAction::Restore)
        );
        assert_eq!(
            AuditAction::from_request(&Method::PATCH, "/api/v1/records/products/abc"),
            Some(AuditAction::Update)
        );
        assert_eq!(
            AuditAction::from_request(&Method::DELETE, "/api/v1/users/abc/purge"),
            Some(AuditAction::Purge)
        );
        assert_eq!(
            AuditAction::from_request(&Method::DELETE, "/api/v1/users/abc"),
            Some(AuditAction::Delete)
        );
        assert_eq!(AuditAction::from_request(&Method::GET, "/api/v1/users/abc"), None);
    }
}
