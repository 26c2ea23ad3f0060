//! 用户服务：委托创建与生命周期管理

use crate::{
    auth::PasswordHasher,
    config::AppConfig,
    error::AppError,
    models::{user::*, Actor, EntityKind},
    policy::{plan_delegation, DelegationCheck, OwnedResource, OwnershipDenial, RolePolicy, SoftDeletePolicy},
    repository::{EntityRepository, UserRepository},
    services::PermissionService,
};
use serde_json::{Map, Value};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub struct UserService {
    db: PgPool,
    config: Arc<AppConfig>,
    role_policy: Arc<RolePolicy>,
    soft_delete: Arc<SoftDeletePolicy>,
    permission: Arc<PermissionService>,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(
        db: PgPool,
        config: Arc<AppConfig>,
        role_policy: Arc<RolePolicy>,
        soft_delete: Arc<SoftDeletePolicy>,
        permission: Arc<PermissionService>,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            db,
            config,
            role_policy,
            soft_delete,
            permission,
            hasher,
        }
    }

    fn users(&self) -> EntityRepository {
        EntityRepository::new(self.db.clone(), EntityKind::User, self.soft_delete.clone())
    }

    /// 委托创建用户
    ///
    /// 角色规则在任何数据库访问之前判定。
    pub async fn create_user(&self, creator: &Actor, req: CreateUserRequest) -> Result<UserResponse, AppError> {
        let check = plan_delegation(&self.role_policy, creator, req.role, req.vendor_id)?;
        ensure_actor_active(&self.db, creator).await?;

        req.validate()?;
        PasswordHasher::validate_password_policy(&req.password, &self.config)?;

        if let DelegationCheck::VendorOwnership(vendor_id) = check {
            let owner_id = Uuid::parse_str(&creator.id)
                .map_err(|_| AppError::forbidden("vendor organization is not owned by creator"))?;
            let repo = UserRepository::new(self.db.clone());
            if !repo.owns_vendor(vendor_id, owner_id).await? {
                tracing::warn!(
                    creator_id = %creator.id,
                    vendor_id = %vendor_id,
                    "Vendor ownership check failed"
                );
                return Err(AppError::forbidden("vendor organization is not owned by creator"));
            }
        }

        let password_hash = self.hasher.hash(&req.password)?;

        let mut payload = Map::new();
        payload.insert("email".to_string(), Value::String(req.email.trim().to_lowercase()));
        payload.insert("passwordHash".to_string(), Value::String(password_hash));
        payload.insert("role".to_string(), Value::String(req.role.as_str().to_string()));
        if let Some(full_name) = req.full_name {
            payload.insert("fullName".to_string(), Value::String(full_name));
        }
        if let Some(vendor_id) = req.vendor_id {
            payload.insert("vendorId".to_string(), Value::String(vendor_id.to_string()));
        }

        let row = self.users().create(Some(creator), payload).await?;
        let id = row
            .get("id")
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| AppError::internal_error("created user row has no id"))?;

        tracing::info!(
            user_id = %id,
            role = req.role.as_str(),
            creator_id = %creator.id,
            "User created"
        );

        self.load(id).await.map(UserResponse::from)
    }

    /// 查看用户；不可见时返回 404
    pub async fn get_user(&self, actor: &Actor, id: Uuid) -> Result<UserResponse, AppError> {
        let user = self.load(id).await?;
        self.permission.require_ownership(
            actor,
            EntityKind::User,
            Some(&user_resource(&user, SelfAccess::Allowed)),
            OwnershipDenial::NotFound,
        )?;

        Ok(user.into())
    }

    /// 修改资料或启停账号；`isActive` 变化经一致性规则推导删除状态
    pub async fn update_user(
        &self,
        actor: &Actor,
        id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<UserResponse, AppError> {
        req.validate()?;
        // 账号启停只能由创建者或全局角色操作
        let self_access = if req.is_active.is_some() {
            SelfAccess::Denied
        } else {
            SelfAccess::Allowed
        };
        self.require_manageable(actor, id, self_access).await?;

        let mut payload = Map::new();
        if let Some(full_name) = req.full_name {
            payload.insert("fullName".to_string(), Value::String(full_name));
        }
        if let Some(is_active) = req.is_active {
            payload.insert("isActive".to_string(), Value::Bool(is_active));
        }
        if payload.is_empty() {
            return Err(AppError::BadRequest("nothing to update".to_string()));
        }

        self.users()
            .update(Some(actor), id, payload)
            .await?
            .ok_or_else(|| AppError::not_found("users"))?;

        tracing::info!(user_id = %id, actor_id = %actor.id, "User updated");
        self.load(id).await.map(UserResponse::from)
    }

    /// 软删除用户
    pub async fn soft_delete_user(&self, actor: &Actor, id: Uuid) -> Result<UserResponse, AppError> {
        self.require_manageable(actor, id, SelfAccess::Allowed).await?;
        self.users().soft_delete(Some(actor), id).await?;

        tracing::info!(user_id = %id, actor_id = %actor.id, "User soft-deleted");
        self.load(id).await.map(UserResponse::from)
    }

    /// 恢复已软删除的用户；本人不能恢复自己
    pub async fn restore_user(&self, actor: &Actor, id: Uuid) -> Result<UserResponse, AppError> {
        self.require_manageable(actor, id, SelfAccess::Denied).await?;
        self.users().restore(Some(actor), id).await?;

        tracing::info!(user_id = %id, actor_id = %actor.id, "User restored");
        self.load(id).await.map(UserResponse::from)
    }

    /// 物理删除用户，仅限最高权限角色
    pub async fn hard_delete_user(&self, actor: &Actor, id: Uuid) -> Result<(), AppError> {
        self.permission.require_hard_delete(actor)?;
        ensure_actor_active(&self.db, actor).await?;

        if !self.users().hard_delete(id).await? {
            return Err(AppError::not_found("users"));
        }

        tracing::warn!(user_id = %id, actor_id = %actor.id, "User permanently deleted");
        Ok(())
    }

    async fn require_manageable(
        &self,
        actor: &Actor,
        id: Uuid,
        self_access: SelfAccess,
    ) -> Result<(), AppError> {
        ensure_actor_active(&self.db, actor).await?;

        let user = self.load(id).await?;
        self.permission.require_ownership(
            actor,
            EntityKind::User,
            Some(&user_resource(&user, self_access)),
            OwnershipDenial::Forbidden,
        )
    }

    async fn load(&self, id: Uuid) -> Result<User, AppError> {
        UserRepository::new(self.db.clone())
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("users"))
    }
}

/// 已软删除的账号不能再发起变更；令牌主体不在用户表中时不做限制
pub async fn ensure_actor_active(db: &PgPool, actor: &Actor) -> Result<(), AppError> {
    let Ok(id) = Uuid::parse_str(&actor.id) else {
        return Ok(());
    };

    if UserRepository::new(db.clone()).is_deleted(id).await? == Some(true) {
        tracing::warn!(actor_id = %actor.id, "Deactivated account attempted a write");
        return Err(AppError::forbidden("account has been deactivated"));
    }

    Ok(())
}

/// 用户本人是否视为自己账号的所有者
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelfAccess {
    Allowed,
    Denied,
}

/// 创建者通过 `created_by_id` 关联
fn user_resource(user: &User, self_access: SelfAccess) -> OwnedResource {
    OwnedResource {
        owner_id: (self_access == SelfAccess::Allowed).then(|| user.id.to_string()),
        created_by_id: user.lifecycle.created_by_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lifecycle;
    use crate::policy::is_owner;
    use chrono::Utc;

    fn user_created_by(creator: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: "clerk@example.com".to_string(),
            password_hash: "hash".to_string(),
            full_name: Some("Shop Clerk".to_string()),
            role: "USER".to_string(),
            vendor_id: None,
            lifecycle: Lifecycle {
                created_by: Some("Lune Atelier".to_string()),
                created_by_id: Some(creator.to_string()),
                ..Default::default()
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_cannot_restore_self() {
        let user = user_created_by("vendor-1");
        let me = Actor::new(user.id.to_string(), "USER");

        assert!(is_owner(&me, &user_resource(&user, SelfAccess::Allowed)));
        assert!(!is_owner(&me, &user_resource(&user, SelfAccess::Denied)));
    }

    #[test]
    fn test_creator_manages_created_user() {
        let user = user_created_by("vendor-1");
        let creator = Actor::new("vendor-1", "VENDOR");
        let namesake = Actor::new("vendor-2", "VENDOR").with_display_name("Lune Atelier");

        assert!(is_owner(&creator, &user_resource(&user, SelfAccess::Denied)));
        assert!(!is_owner(&namesake, &user_resource(&user, SelfAccess::Denied)));
    }
}
