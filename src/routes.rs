//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
};

use crate::{
    auth::{jwt_auth_middleware, ownership_guard, record_role_guard, require_roles, RoleGate},
    handlers,
    middleware::{audit_trail_middleware, request_tracking_middleware, AppState},
    models::Role,
};

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // 用户管理：委托创建、软删除、恢复、物理删除
    let user_routes = Router::new()
        .route("/api/v1/users", post(handlers::user::create_user))
        .route(
            "/api/v1/users/{id}",
            get(handlers::user::get_user)
                .patch(handlers::user::update_user)
                .delete(handlers::user::delete_user),
        )
        .route("/api/v1/users/{id}/restore", post(handlers::user::restore_user))
        .route("/api/v1/users/{id}/purge", delete(handlers::user::purge_user));

    // 通用记录集合（写入按实体类型要求角色）
    let record_collection_routes = Router::new()
        .route(
            "/api/v1/records/{entity}",
            get(handlers::record::list_records)
                .post(handlers::record::create_record)
                .patch(handlers::record::bulk_update_records),
        )
        .route_layer(from_fn_with_state(state.clone(), record_role_guard));

    // 单条记录；角色校验在外层，先于归属校验执行
    let record_member_routes = Router::new()
        .route(
            "/api/v1/records/{entity}/{id}",
            get(handlers::record::get_record)
                .patch(handlers::record::update_record)
                .put(handlers::record::upsert_record)
                .delete(handlers::record::delete_record),
        )
        .route(
            "/api/v1/records/{entity}/{id}/restore",
            post(handlers::record::restore_record),
        )
        .route(
            "/api/v1/records/{entity}/{id}/purge",
            delete(handlers::record::purge_record),
        )
        .route_layer(from_fn_with_state(state.clone(), ownership_guard))
        .route_layer(from_fn_with_state(state.clone(), record_role_guard));

    // 审计日志（管理员及以上）
    let audit_routes = Router::new()
        .route("/api/v1/audit/logs", get(handlers::audit::list_audit_logs))
        .route_layer(from_fn_with_state(
            RoleGate::new(state.role_policy.clone(), &[Role::Admin]),
            require_roles,
        ));

    // 需要认证的路由；认证在外层，审计留痕可读取身份
    let authenticated_routes = Router::new()
        .merge(user_routes)
        .merge(record_collection_routes)
        .merge(record_member_routes)
        .merge(audit_routes)
        .layer(from_fn_with_state(state.clone(), audit_trail_middleware))
        .layer(from_fn_with_state(
            state.jwt_service.clone(),
            jwt_auth_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // 组合所有路由
    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .layer(RequestBodyLimitLayer::new(state.config.server.body_limit_bytes))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(from_fn(request_tracking_middleware))
        .with_state(state)
}
