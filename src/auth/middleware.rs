//! 认证与访问控制中间件
//!
//! - `jwt_auth_middleware`：校验令牌并注入 [`AuthContext`]
//! - `require_roles`：路由级角色要求
//! - `record_role_guard`：通用记录按实体类型的写入角色要求
//! - `ownership_guard`：路由级资源归属校验

use crate::{
    auth::jwt::JwtService,
    error::AppError,
    middleware::AppState,
    models::{Actor, EntityKind, Role},
    policy::{check_ownership, OwnershipDenial, OwnershipSpec, RolePolicy},
};
use axum::{
    extract::{FromRequestParts, Path, Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// 认证上下文（附加到请求扩展）
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub role: String,
    pub display_name: Option<String>,
}

impl AuthContext {
    /// 传递给数据访问层的显式身份
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.user_id.clone(),
            role: self.role.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

impl From<&Actor> for AuthContext {
    fn from(actor: &Actor) -> Self {
        Self {
            user_id: actor.id.clone(),
            role: actor.role.clone(),
            display_name: actor.display_name.clone(),
        }
    }
}

// 实现 FromRequestParts 以便在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// 从 Authorization 头提取令牌
pub fn extract_token(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Unauthorized)
}

/// JWT 认证中间件 - 必须认证
pub async fn jwt_auth_middleware(
    State(jwt_service): State<Arc<JwtService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(req.headers())?;
    let claims = jwt_service.validate_access_token(&token)?;

    if claims.sub.trim().is_empty() {
        return Err(AppError::Unauthorized);
    }

    let auth_context = AuthContext::from(&claims.actor());
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

/// 路由所需角色
#[derive(Clone)]
pub struct RoleGate {
    policy: Arc<RolePolicy>,
    required: &'static [Role],
}

impl RoleGate {
    pub fn new(policy: Arc<RolePolicy>, required: &'static [Role]) -> Self {
        Self { policy, required }
    }
}

/// 角色校验中间件：满足任一所需角色的等级即可
pub async fn require_roles(
    State(gate): State<RoleGate>,
    auth_context: AuthContext,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !gate.policy.is_authorized(&auth_context.role, gate.required) {
        tracing::warn!(
            user_id = %auth_context.user_id,
            role = %auth_context.role,
            required = ?gate.required,
            "Role check failed"
        );
        return Err(AppError::forbidden("insufficient role for this action"));
    }

    Ok(next.run(req).await)
}

/// 通用记录的写入角色要求（满足任一即可）；读取只需认证
pub const RECORD_WRITE_ROLES: [(EntityKind, &[Role]); 10] = [
    (EntityKind::Vendor, &[Role::Vendor]),
    (EntityKind::Product, &[Role::Vendor]),
    (EntityKind::Collection, &[Role::Admin]),
    (EntityKind::Article, &[Role::Admin]),
    (EntityKind::ShippingMethod, &[Role::Admin]),
    (EntityKind::NewsletterSubscriber, &[Role::Admin]),
    (EntityKind::Review, &[Role::User]),
    (EntityKind::Like, &[Role::User]),
    (EntityKind::Bookmark, &[Role::User]),
    (EntityKind::ProductView, &[Role::User]),
];

/// 未登记的实体不可写
pub fn record_write_roles(entity: EntityKind) -> Option<&'static [Role]> {
    RECORD_WRITE_ROLES
        .iter()
        .find(|(kind, _)| *kind == entity)
        .map(|(_, roles)| *roles)
}

/// 通用记录写入的角色校验中间件，需挂在归属校验之外
pub async fn record_role_guard(
    State(state): State<Arc<AppState>>,
    Path(params): Path<HashMap<String, String>>,
    auth_context: AuthContext,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return Ok(next.run(req).await);
    }

    // 未知实体（含 users）交给处理器返回 404
    let Some(entity) = params
        .get("entity")
        .and_then(|slug| slug.parse::<EntityKind>().ok())
        .filter(|entity| *entity != EntityKind::User)
    else {
        return Ok(next.run(req).await);
    };

    let allowed = record_write_roles(entity)
        .is_some_and(|required| state.role_policy.is_authorized(&auth_context.role, required));
    if !allowed {
        tracing::warn!(
            user_id = %auth_context.user_id,
            role = %auth_context.role,
            entity = %entity,
            "Record write rejected by role"
        );
        return Err(AppError::forbidden("insufficient role for this action"));
    }

    Ok(next.run(req).await)
}

/// 需要归属校验的记录类型；不存在与无权限统一返回 404
pub const RECORD_OWNERSHIP: [OwnershipSpec; 7] = [
    OwnershipSpec::new(EntityKind::Product, "id", OwnershipDenial::NotFound),
    OwnershipSpec::new(EntityKind::Vendor, "id", OwnershipDenial::NotFound),
    OwnershipSpec::new(EntityKind::Article, "id", OwnershipDenial::NotFound),
    OwnershipSpec::new(EntityKind::Review, "id", OwnershipDenial::NotFound),
    OwnershipSpec::new(EntityKind::Like, "id", OwnershipDenial::NotFound),
    OwnershipSpec::new(EntityKind::Bookmark, "id", OwnershipDenial::NotFound),
    OwnershipSpec::new(EntityKind::ProductView, "id", OwnershipDenial::NotFound),
];

/// 归属校验中间件，仅作用于变更请求
pub async fn ownership_guard(
    State(state): State<Arc<AppState>>,
    Path(params): Path<HashMap<String, String>>,
    auth_context: AuthContext,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return Ok(next.run(req).await);
    }

    let Some(guard) = params
        .get("entity")
        .and_then(|slug| slug.parse::<EntityKind>().ok())
        .and_then(|entity| RECORD_OWNERSHIP.iter().find(|s| s.entity == entity))
    else {
        return Ok(next.run(req).await);
    };

    let id = params
        .get(guard.param)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| AppError::BadRequest(format!("invalid {} id", guard.entity)))?;

    // 资源不存在时交给处理器返回 404
    if let Some(resource) = state.record_service.owner_of(guard.entity, id).await? {
        check_ownership(
            &state.role_policy,
            &auth_context.actor(),
            guard.entity,
            &resource,
            guard.denial,
        )?;
    }

    Ok(next.run(req).await)
}
