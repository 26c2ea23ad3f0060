//! 审计日志的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext, error::AppError, middleware::AppState, models::audit::*,
};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogQuery {
    pub entity: Option<String>,
    pub entity_id: Option<String>,
    pub action: Option<String>,
    pub actor_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// 查询审计日志（路由层已限定管理员）
pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    _auth_context: AuthContext,
    Query(query): Query<AuditLogQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filters = AuditLogFilters {
        entity: query.entity,
        entity_id: query.entity_id,
        action: query.action,
        actor_id: query.actor_id,
        start_time: query.start_time,
        end_time: query.end_time,
    };
    let limit = query.limit.clamp(1, 500);
    let offset = query.offset.max(0);

    let logs = state.audit_service.query_logs(&filters, limit, offset).await?;
    let total = state.audit_service.count_logs(&filters).await?;

    Ok(Json(json!({
        "logs": logs,
        "count": logs.len(),
        "total": total
    })))
}
