//! User repository (数据库访问层)
//!
//! 只负责读取；用户写入统一经过 [`EntityRepository`](super::EntityRepository)。

use crate::{error::AppError, models::user::*};
use sqlx::PgPool;
use uuid::Uuid;

pub struct UserRepository {
    db: PgPool,
}

impl UserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 根据 ID 查找用户
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, full_name, role, vendor_id,
                   is_active, is_deleted, created_by, created_by_id, updated_by, deleted_by, deleted_at,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    /// 账号是否已被软删除；不存在的账号返回 `None`
    pub async fn is_deleted(&self, id: Uuid) -> Result<Option<bool>, AppError> {
        let deleted: Option<bool> = sqlx::query_scalar("SELECT is_deleted FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(deleted)
    }

    /// 商户组织是否归属该用户
    pub async fn owns_vendor(&self, vendor_id: Uuid, owner_id: Uuid) -> Result<bool, AppError> {
        let owns: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM vendors
                WHERE id = $1 AND owner_id = $2 AND NOT is_deleted
            )
            "#,
        )
        .bind(vendor_id)
        .bind(owner_id)
        .fetch_one(&self.db)
        .await?;

        Ok(owns)
    }
}
