//! 通用记录的 HTTP 处理器
//!
//! `/api/v1/records/{entity}` 覆盖商品、商户、合集、文章、配送方式、评价、
//! 订阅与互动记录。用户有独立的路由。

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::{EntityKind, RecordListQuery, Role},
    services::AuditRecordId,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    pub ids: Vec<Uuid>,
    pub data: Value,
}

#[derive(Debug, Deserialize)]
pub struct UpsertRequest {
    #[serde(default = "empty_object")]
    pub create: Value,
    #[serde(default = "empty_object")]
    pub update: Value,
}

fn empty_object() -> Value {
    json!({})
}

/// 解析路径中的实体名
pub fn resolve_entity(slug: &str) -> Result<EntityKind, AppError> {
    match slug.parse::<EntityKind>() {
        Ok(EntityKind::User) | Err(_) => Err(AppError::NotFound(format!("unknown entity: {}", slug))),
        Ok(entity) => Ok(entity),
    }
}

/// 列出记录
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    _auth_context: AuthContext,
    Path(entity): Path<String>,
    Query(query): Query<RecordListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let entity = resolve_entity(&entity)?;
    let items = state.record_service.list(entity, &query).await?;

    Ok(Json(json!({
        "items": items,
        "count": items.len()
    })))
}

/// 创建记录
pub async fn create_record(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(entity): Path<String>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = resolve_entity(&entity)?;
    let record = state
        .record_service
        .create(&auth_context.actor(), entity, payload)
        .await?;

    let audit_id = AuditRecordId::from_record(&record);
    let mut response = (StatusCode::CREATED, Json(record)).into_response();
    if let Some(audit_id) = audit_id {
        response.extensions_mut().insert(audit_id);
    }
    Ok(response)
}

/// 批量更新（跳过逐条归属校验，因此限管理员）
pub async fn bulk_update_records(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(entity): Path<String>,
    Json(req): Json<BulkUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let entity = resolve_entity(&entity)?;
    let actor = auth_context.actor();
    state.permission_service.require_roles(&actor, &[Role::Admin])?;

    let updated = state
        .record_service
        .update_many(&actor, entity, &req.ids, req.data)
        .await?;

    Ok(Json(json!({ "updated": updated })))
}

/// 获取记录
pub async fn get_record(
    State(state): State<Arc<AppState>>,
    _auth_context: AuthContext,
    Path((entity, id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = resolve_entity(&entity)?;
    let record = state.record_service.get(entity, id).await?;
    Ok(Json(record))
}

/// 更新记录
pub async fn update_record(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path((entity, id)): Path<(String, Uuid)>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = resolve_entity(&entity)?;
    let record = state
        .record_service
        .update(&auth_context.actor(), entity, id, payload)
        .await?;
    Ok(Json(record))
}

/// 存在则更新，否则创建
pub async fn upsert_record(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path((entity, id)): Path<(String, Uuid)>,
    Json(req): Json<UpsertRequest>,
) -> Result<impl IntoResponse, AppError> {
    let entity = resolve_entity(&entity)?;
    let record = state
        .record_service
        .upsert(&auth_context.actor(), entity, id, req.create, req.update)
        .await?;
    Ok(Json(record))
}

/// 软删除记录
pub async fn delete_record(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path((entity, id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = resolve_entity(&entity)?;
    let record = state
        .record_service
        .soft_delete(&auth_context.actor(), entity, id)
        .await?;
    Ok(Json(record))
}

/// 恢复记录
pub async fn restore_record(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path((entity, id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = resolve_entity(&entity)?;
    let record = state
        .record_service
        .restore(&auth_context.actor(), entity, id)
        .await?;
    Ok(Json(record))
}

/// 物理删除记录
pub async fn purge_record(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path((entity, id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = resolve_entity(&entity)?;
    state
        .record_service
        .hard_delete(&auth_context.actor(), entity, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
