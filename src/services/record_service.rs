//! 通用记录服务（商品、商户、合集、文章等）

use crate::{
    error::AppError,
    models::{Actor, EntityKind, RecordListQuery},
    policy::{
        soft_delete::{CREATED_BY, DELETED_BY, UPDATED_BY},
        OwnedResource, SoftDeletePolicy,
    },
    repository::{columns::to_camel_case, EntityRepository, UserRepository},
    services::{user_service::ensure_actor_active, PermissionService},
};
use serde_json::{Map, Value};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// 非全局角色不能自行填写的署名字段
const PROTECTED_FIELDS: [&str; 3] = [CREATED_BY, UPDATED_BY, DELETED_BY];

const VENDOR_ID: &str = "vendorId";

pub struct RecordService {
    db: PgPool,
    soft_delete: Arc<SoftDeletePolicy>,
    permission: Arc<PermissionService>,
}

impl RecordService {
    pub fn new(db: PgPool, soft_delete: Arc<SoftDeletePolicy>, permission: Arc<PermissionService>) -> Self {
        Self {
            db,
            soft_delete,
            permission,
        }
    }

    fn repo(&self, entity: EntityKind) -> EntityRepository {
        EntityRepository::new(self.db.clone(), entity, self.soft_delete.clone())
    }

    pub async fn list(&self, entity: EntityKind, query: &RecordListQuery) -> Result<Vec<Value>, AppError> {
        self.repo(entity).list(query).await
    }

    pub async fn get(&self, entity: EntityKind, id: Uuid) -> Result<Value, AppError> {
        self.repo(entity)
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(entity.table()))
    }

    /// 新记录未指定所有者时归属当前用户
    pub async fn create(&self, actor: &Actor, entity: EntityKind, payload: Value) -> Result<Value, AppError> {
        let mut payload = into_object(payload)?;
        self.prepare_write(actor, entity, &mut payload).await?;
        stamp_owner(entity, actor, &mut payload);
        self.repo(entity).create(Some(actor), payload).await
    }

    pub async fn update(
        &self,
        actor: &Actor,
        entity: EntityKind,
        id: Uuid,
        payload: Value,
    ) -> Result<Value, AppError> {
        let mut payload = into_object(payload)?;
        self.prepare_write(actor, entity, &mut payload).await?;
        self.repo(entity)
            .update(Some(actor), id, payload)
            .await?
            .ok_or_else(|| AppError::not_found(entity.table()))
    }

    pub async fn update_many(
        &self,
        actor: &Actor,
        entity: EntityKind,
        ids: &[Uuid],
        payload: Value,
    ) -> Result<u64, AppError> {
        let mut payload = into_object(payload)?;
        self.prepare_write(actor, entity, &mut payload).await?;
        self.repo(entity).update_many(Some(actor), ids, payload).await
    }

    pub async fn upsert(
        &self,
        actor: &Actor,
        entity: EntityKind,
        id: Uuid,
        create: Value,
        update: Value,
    ) -> Result<Value, AppError> {
        let mut create = into_object(create)?;
        let mut update = into_object(update)?;
        self.prepare_write(actor, entity, &mut create).await?;
        self.prepare_write(actor, entity, &mut update).await?;
        stamp_owner(entity, actor, &mut create);
        self.repo(entity).upsert(Some(actor), id, create, update).await
    }

    pub async fn soft_delete(&self, actor: &Actor, entity: EntityKind, id: Uuid) -> Result<Value, AppError> {
        ensure_actor_active(&self.db, actor).await?;
        self.repo(entity)
            .soft_delete(Some(actor), id)
            .await?
            .ok_or_else(|| AppError::not_found(entity.table()))
    }

    pub async fn restore(&self, actor: &Actor, entity: EntityKind, id: Uuid) -> Result<Value, AppError> {
        ensure_actor_active(&self.db, actor).await?;
        self.repo(entity)
            .restore(Some(actor), id)
            .await?
            .ok_or_else(|| AppError::not_found(entity.table()))
    }

    /// 物理删除，仅限最高权限角色
    pub async fn hard_delete(&self, actor: &Actor, entity: EntityKind, id: Uuid) -> Result<(), AppError> {
        self.permission.require_hard_delete(actor)?;
        ensure_actor_active(&self.db, actor).await?;

        if !self.repo(entity).hard_delete(id).await? {
            return Err(AppError::not_found(entity.table()));
        }

        tracing::warn!(
            entity = %entity,
            id = %id,
            actor_id = %actor.id,
            "Record permanently deleted"
        );
        Ok(())
    }

    pub async fn owner_of(&self, entity: EntityKind, id: Uuid) -> Result<Option<OwnedResource>, AppError> {
        self.repo(entity).owner_of(id).await
    }

    /// 写入前的身份校验：账号有效；非全局角色不能改写归属，且只能挂到自己的商户下
    async fn prepare_write(
        &self,
        actor: &Actor,
        entity: EntityKind,
        payload: &mut Map<String, Value>,
    ) -> Result<(), AppError> {
        ensure_actor_active(&self.db, actor).await?;
        if self.permission.is_global(actor) {
            return Ok(());
        }

        strip_protected(entity, payload);

        if let Some(vendor_id) = requested_vendor(payload)? {
            let owns = match Uuid::parse_str(&actor.id) {
                Ok(owner_id) => {
                    UserRepository::new(self.db.clone())
                        .owns_vendor(vendor_id, owner_id)
                        .await?
                }
                Err(_) => false,
            };
            if !owns {
                tracing::warn!(
                    actor_id = %actor.id,
                    vendor_id = %vendor_id,
                    entity = %entity,
                    "Write into a foreign vendor rejected"
                );
                return Err(AppError::forbidden("vendor organization is not owned by actor"));
            }
        }

        Ok(())
    }
}

/// 去掉署名字段与实体的归属列，归属由 [`stamp_owner`] 重新写入
fn strip_protected(entity: EntityKind, payload: &mut Map<String, Value>) {
    for field in PROTECTED_FIELDS {
        payload.remove(field);
    }
    if let Some(column) = entity.owner_column() {
        payload.remove(&to_camel_case(column));
    }
}

fn requested_vendor(payload: &Map<String, Value>) -> Result<Option<Uuid>, AppError> {
    match payload.get(VENDOR_ID) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => Uuid::parse_str(raw)
            .map(Some)
            .map_err(|_| AppError::BadRequest("vendorId must be a UUID".to_string())),
        Some(_) => Err(AppError::BadRequest("vendorId must be a UUID".to_string())),
    }
}

fn into_object(payload: Value) -> Result<Map<String, Value>, AppError> {
    match payload {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::BadRequest("payload must be a JSON object".to_string())),
    }
}

fn stamp_owner(entity: EntityKind, actor: &Actor, payload: &mut Map<String, Value>) {
    if let Some(column) = entity.owner_column() {
        let key = to_camel_case(column);
        if payload.get(&key).map_or(true, Value::is_null) {
            payload.insert(key, Value::String(actor.id.clone()));
        }
    }
}
