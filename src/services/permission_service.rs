//! 权限检查服务
//!
//! 基于角色规则表的同步判定，不访问数据库。

use crate::{
    error::AppError,
    models::{Actor, EntityKind, Role},
    policy::{check_ownership, OwnedResource, OwnershipDenial, RolePolicy},
};
use std::sync::Arc;

pub struct PermissionService {
    policy: Arc<RolePolicy>,
}

impl PermissionService {
    pub fn new(policy: Arc<RolePolicy>) -> Self {
        Self { policy }
    }

    /// GLOBAL 作用域角色不受归属限制
    pub fn is_global(&self, actor: &Actor) -> bool {
        self.policy.is_global(&actor.role)
    }

    /// 检查角色是否满足要求
    pub fn check_roles(&self, actor: &Actor, required: &[Role]) -> bool {
        self.policy.is_authorized(&actor.role, required)
    }

    /// 检查角色，如果不满足则返回错误
    pub fn require_roles(&self, actor: &Actor, required: &[Role]) -> Result<(), AppError> {
        if !self.check_roles(actor, required) {
            tracing::warn!(
                actor_id = %actor.id,
                role = %actor.role,
                required = ?required,
                "Permission denied"
            );
            return Err(AppError::forbidden("insufficient role for this action"));
        }

        Ok(())
    }

    /// 物理删除仅限最高权限角色
    pub fn require_hard_delete(&self, actor: &Actor) -> Result<(), AppError> {
        if !self.policy.can_hard_delete(&actor.role) {
            tracing::warn!(
                actor_id = %actor.id,
                role = %actor.role,
                "Hard delete denied"
            );
            return Err(AppError::Forbidden(format!(
                "only {} may permanently delete records",
                self.policy.top_role()
            )));
        }

        Ok(())
    }

    /// 资源归属校验；资源不存在时返回 404
    pub fn require_ownership(
        &self,
        actor: &Actor,
        entity: EntityKind,
        resource: Option<&OwnedResource>,
        denial: OwnershipDenial,
    ) -> Result<(), AppError> {
        match resource {
            Some(resource) => check_ownership(&self.policy, actor, entity, resource, denial),
            None => Err(AppError::not_found(entity.table())),
        }
    }
}
