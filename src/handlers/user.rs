//! 用户管理的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext, error::AppError, middleware::AppState, models::user::*,
    services::AuditRecordId,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// 委托创建用户
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .user_service
        .create_user(&auth_context.actor(), req)
        .await?;

    Ok((
        StatusCode::CREATED,
        Extension(AuditRecordId(user.id.to_string())),
        Json(json!({ "user": user })),
    ))
}

/// 获取用户详情
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.user_service.get_user(&auth_context.actor(), id).await?;
    Ok(Json(json!({ "user": user })))
}

/// 更新用户
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .user_service
        .update_user(&auth_context.actor(), id, req)
        .await?;
    Ok(Json(json!({ "user": user })))
}

/// 软删除用户
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .user_service
        .soft_delete_user(&auth_context.actor(), id)
        .await?;
    Ok(Json(json!({ "user": user })))
}

/// 恢复用户
pub async fn restore_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .user_service
        .restore_user(&auth_context.actor(), id)
        .await?;
    Ok(Json(json!({ "user": user })))
}

/// 物理删除用户
pub async fn purge_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .user_service
        .hard_delete_user(&auth_context.actor(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
