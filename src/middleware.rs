//! HTTP 中间件
//! 应用状态、请求追踪、审计留痕

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    auth::{AuthContext, JwtService, PasswordHasher},
    config::AppConfig,
    error::AppError,
    models::EntityKind,
    policy::{RolePolicy, SoftDeletePolicy},
    services::{
        AuditAction, AuditRecordId, AuditService, PermissionService, RecordService, UserService,
    },
};

/// 应用状态
///
/// 服务以 Arc 共享，Clone 只是指针拷贝。
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: sqlx::PgPool,
    pub role_policy: Arc<RolePolicy>,
    pub soft_delete: Arc<SoftDeletePolicy>,
    pub jwt_service: Arc<JwtService>,
    pub permission_service: Arc<PermissionService>,
    pub audit_service: Arc<AuditService>,
    pub user_service: Arc<UserService>,
    pub record_service: Arc<RecordService>,
}

impl AppState {
    /// 组装所有服务；角色规则表在启动时加载一次
    pub fn new(config: AppConfig, db: sqlx::PgPool, role_policy: RolePolicy) -> Result<Self, AppError> {
        let role_policy = Arc::new(role_policy);
        let soft_delete = Arc::new(SoftDeletePolicy::new());
        let jwt_service = Arc::new(JwtService::from_config(&config)?);
        let permission_service = Arc::new(PermissionService::new(role_policy.clone()));
        let audit_service = Arc::new(AuditService::new(db.clone()));

        let user_service = Arc::new(UserService::new(
            db.clone(),
            Arc::new(config.clone()),
            role_policy.clone(),
            soft_delete.clone(),
            permission_service.clone(),
            PasswordHasher::new(),
        ));
        let record_service = Arc::new(RecordService::new(
            db.clone(),
            soft_delete.clone(),
            permission_service.clone(),
        ));

        Ok(Self {
            config,
            db,
            role_policy,
            soft_delete,
            jwt_service,
            permission_service,
            audit_service,
            user_service,
            record_service,
        })
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let uri = req.uri().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();

        let mut response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        // 限定标签取值，避免指标基数膨胀
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            "PATCH" => "PATCH",
            _ => "OTHER",
        };
        let status_class = match status {
            200..=299 => "2xx",
            300..=399 => "3xx",
            400..=499 => "4xx",
            _ => "5xx",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_class)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis(),
            "Request completed"
        );

        set_header(response.headers_mut(), "x-trace-id", &trace_id);
        set_header(response.headers_mut(), "x-request-id", &request_id);

        response
    }
    .instrument(span)
    .await
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// 审计留痕中间件
///
/// 变更请求成功（2xx）后写入审计日志；写入失败不影响响应。
/// 需挂在认证中间件之内，才能读到 [`AuthContext`]。
pub async fn audit_trail_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let actor_id = req
        .extensions()
        .get::<AuthContext>()
        .map(|ctx| ctx.user_id.clone());

    let response = next.run(req).await;

    if response.status().is_success() {
        if let Some(action) = AuditAction::from_request(&method, &path) {
            let (entity, path_id) = audit_target(&path);
            let entity_id = audit_entity_id(path_id, &response);
            state
                .audit_service
                .record(
                    &entity,
                    entity_id.as_deref(),
                    action,
                    actor_id.as_deref(),
                    Some(json!({
                        "method": method.as_str(),
                        "path": path,
                        "status": response.status().as_u16(),
                    })),
                )
                .await;
        }
    }

    response
}

/// 从路径推断审计对象：`/api/v1/records/{entity}/{id}`、`/api/v1/users/{id}`
fn audit_target(path: &str) -> (String, Option<String>) {
    let mut segments = path
        .trim_start_matches("/api/v1/")
        .split('/')
        .filter(|s| !s.is_empty());

    match segments.next() {
        Some("records") => {
            let entity = segments
                .next()
                .map(|slug| {
                    slug.parse::<EntityKind>()
                        .map(|k| k.table().to_string())
                        .unwrap_or_else(|_| slug.to_string())
                })
                .unwrap_or_else(|| "records".to_string());
            (entity, segments.next().map(str::to_string))
        }
        Some(resource) => (resource.to_string(), segments.next().map(str::to_string)),
        None => ("unknown".to_string(), None),
    }
}

/// 路径中没有主键时（创建请求），取处理器放入响应扩展的新记录主键
fn audit_entity_id(path_id: Option<String>, response: &Response) -> Option<String> {
    path_id.or_else(|| {
        response
            .extensions()
            .get::<AuditRecordId>()
            .map(|id| id.0.clone())
    })
}
