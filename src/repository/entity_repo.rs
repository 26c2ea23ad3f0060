//! Entity repository (通用实体数据访问层)
//!
//! 所有写操作都经过此处：先由 [`SoftDeletePolicy`] 修正载荷，再落库。
//! 每次调用显式传入 `actor`，不依赖任何请求级隐式上下文。

use crate::{
    error::AppError,
    models::{Actor, EntityKind, RecordListQuery},
    policy::{
        soft_delete::{IS_DELETED, UPSERT_CREATE, UPSERT_UPDATE},
        OwnedResource, SoftDeletePolicy, WriteContext, WriteKind,
    },
    repository::columns::{payload_to_columns, row_to_camel, MANAGED_COLUMNS},
};
use serde_json::{Map, Value};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub struct EntityRepository {
    db: PgPool,
    entity: EntityKind,
    policy: Arc<SoftDeletePolicy>,
}

impl EntityRepository {
    pub fn new(db: PgPool, entity: EntityKind, policy: Arc<SoftDeletePolicy>) -> Self {
        Self { db, entity, policy }
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    fn enforce(&self, actor: Option<&Actor>, kind: WriteKind, payload: &mut Map<String, Value>) {
        let ctx = WriteContext::new(actor, kind);
        self.policy.apply(self.entity, &ctx, payload);
    }

    fn require_lifecycle(&self) -> Result<(), AppError> {
        if self.entity.has_lifecycle() {
            Ok(())
        } else {
            Err(AppError::BadRequest(format!(
                "{} does not support soft delete",
                self.entity
            )))
        }
    }

    /// 根据 ID 查找（包含已软删除记录）
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Value>, AppError> {
        let sql = format!(
            "SELECT to_jsonb(t.*) FROM {} t WHERE t.id = $1",
            self.entity.table()
        );
        let row: Option<Value> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(row_to_camel))
    }

    /// 列表查询，默认排除已软删除记录
    pub async fn list(&self, query: &RecordListQuery) -> Result<Vec<Value>, AppError> {
        let filter = if self.entity.has_lifecycle() && !query.include_deleted {
            "WHERE NOT t.is_deleted"
        } else {
            ""
        };
        let sql = format!(
            "SELECT to_jsonb(t.*) FROM {} t {} ORDER BY t.created_at DESC LIMIT $1 OFFSET $2",
            self.entity.table(),
            filter
        );

        let rows: Vec<Value> = sqlx::query_scalar(&sql)
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(&self.db)
            .await?;

        Ok(rows.into_iter().map(row_to_camel).collect())
    }

    /// 创建记录
    pub async fn create(
        &self,
        actor: Option<&Actor>,
        mut payload: Map<String, Value>,
    ) -> Result<Value, AppError> {
        self.enforce(actor, WriteKind::Create, &mut payload);
        let columns = writable_columns(payload)?;

        let sql = insert_sql(self.entity.table(), &column_names(&columns));
        let row: Value = sqlx::query_scalar(&sql)
            .bind(Value::Object(columns))
            .fetch_one(&self.db)
            .await?;

        Ok(row_to_camel(row))
    }

    /// 更新单条记录
    pub async fn update(
        &self,
        actor: Option<&Actor>,
        id: Uuid,
        mut payload: Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        self.enforce(actor, WriteKind::Update, &mut payload);
        self.update_where(id, payload, None).await
    }

    /// 按 ID 集合批量更新，返回受影响行数
    pub async fn update_many(
        &self,
        actor: Option<&Actor>,
        ids: &[Uuid],
        mut payload: Map<String, Value>,
    ) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }

        self.enforce(actor, WriteKind::UpdateMany, &mut payload);
        let columns = writable_columns(payload)?;

        let sql = update_sql(
            self.entity.table(),
            &column_names(&columns),
            &format!("{}.id = ANY($2)", self.entity.table()),
        );
        let result = sqlx::query(&sql)
            .bind(Value::Object(columns))
            .bind(ids)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    /// 按 ID 存在则更新、否则创建；两个分支分别经过一致性修正
    pub async fn upsert(
        &self,
        actor: Option<&Actor>,
        id: Uuid,
        create: Map<String, Value>,
        update: Map<String, Value>,
    ) -> Result<Value, AppError> {
        let mut payload = Map::new();
        payload.insert(UPSERT_CREATE.to_string(), Value::Object(create));
        payload.insert(UPSERT_UPDATE.to_string(), Value::Object(update));
        self.enforce(actor, WriteKind::Upsert, &mut payload);

        let create = take_object(&mut payload, UPSERT_CREATE);
        let update = writable_columns(take_object(&mut payload, UPSERT_UPDATE))?;
        let table = self.entity.table();

        let mut tx = self.db.begin().await?;

        let updated: Option<Value> = sqlx::query_scalar(&update_sql(
            table,
            &column_names(&update),
            &format!("{}.id = $2", table),
        ))
        .bind(Value::Object(update))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let row = match updated {
            Some(row) => row,
            None => {
                let mut columns = writable_columns(create)?;
                columns.insert("id".to_string(), Value::String(id.to_string()));
                sqlx::query_scalar(&insert_sql(table, &column_names(&columns)))
                    .bind(Value::Object(columns))
                    .fetch_one(&mut *tx)
                    .await?
            }
        };

        tx.commit().await?;

        Ok(row_to_camel(row))
    }

    /// 软删除；已删除的记录原样返回
    pub async fn soft_delete(&self, actor: Option<&Actor>, id: Uuid) -> Result<Option<Value>, AppError> {
        self.toggle_deleted(actor, id, true).await
    }

    /// 恢复软删除；未删除的记录原样返回
    pub async fn restore(&self, actor: Option<&Actor>, id: Uuid) -> Result<Option<Value>, AppError> {
        self.toggle_deleted(actor, id, false).await
    }

    async fn toggle_deleted(
        &self,
        actor: Option<&Actor>,
        id: Uuid,
        deleted: bool,
    ) -> Result<Option<Value>, AppError> {
        self.require_lifecycle()?;

        let mut payload = Map::new();
        payload.insert(IS_DELETED.to_string(), Value::Bool(deleted));
        self.enforce(actor, WriteKind::Update, &mut payload);

        let guard = format!("{}.is_deleted = {}", self.entity.table(), !deleted);
        match self.update_where(id, payload, Some(&guard)).await? {
            Some(row) => Ok(Some(row)),
            None => self.find_by_id(id).await,
        }
    }

    /// 物理删除，绕过一致性约束；调用方负责权限校验
    pub async fn hard_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.entity.table());
        let result = sqlx::query(&sql).bind(id).execute(&self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    /// 读取所有权相关字段
    pub async fn owner_of(&self, id: Uuid) -> Result<Option<OwnedResource>, AppError> {
        let owner = self.entity.owner_column().unwrap_or("NULL");
        let created_by_id = if self.entity.has_lifecycle() {
            "created_by_id"
        } else {
            "NULL"
        };
        let sql = format!(
            "SELECT {}::text, {}::text FROM {} WHERE id = $1",
            owner,
            created_by_id,
            self.entity.table()
        );

        let row: Option<(Option<String>, Option<String>)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(|(owner_id, created_by_id)| OwnedResource {
            owner_id,
            created_by_id,
        }))
    }

    async fn update_where(
        &self,
        id: Uuid,
        payload: Map<String, Value>,
        guard: Option<&str>,
    ) -> Result<Option<Value>, AppError> {
        let columns = writable_columns(payload)?;
        let table = self.entity.table();

        let mut filter = format!("{}.id = $2", table);
        if let Some(guard) = guard {
            filter.push_str(" AND ");
            filter.push_str(guard);
        }

        let row: Option<Value> = sqlx::query_scalar(&update_sql(table, &column_names(&columns), &filter))
            .bind(Value::Object(columns))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(row_to_camel))
    }
}

fn take_object(payload: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
    match payload.remove(key) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn writable_columns(payload: Map<String, Value>) -> Result<Map<String, Value>, AppError> {
    let mut columns = payload_to_columns(payload)?;
    columns.retain(|column, _| !MANAGED_COLUMNS.contains(&column.as_str()));
    Ok(columns)
}

fn column_names(columns: &Map<String, Value>) -> Vec<&str> {
    columns.keys().map(String::as_str).collect()
}

/// `$1` 为 jsonb 载荷
pub(crate) fn insert_sql(table: &str, columns: &[&str]) -> String {
    if columns.is_empty() {
        return format!("INSERT INTO {table} DEFAULT VALUES RETURNING to_jsonb({table}.*)");
    }

    let list = columns.join(", ");
    format!(
        "INSERT INTO {table} ({list}) \
         SELECT {list} FROM jsonb_populate_record(NULL::{table}, $1) \
         RETURNING to_jsonb({table}.*)"
    )
}

/// `$1` 为 jsonb 载荷，其余占位符由 `filter` 决定
pub(crate) fn update_sql(table: &str, columns: &[&str], filter: &str) -> String {
    let assignments = columns
        .iter()
        .map(|column| format!("{column} = r.{column}"))
        .chain(std::iter::once("updated_at = NOW()".to_string()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "UPDATE {table} SET {assignments} \
         FROM jsonb_populate_record(NULL::{table}, $1) AS r \
         WHERE {filter} \
         RETURNING to_jsonb({table}.*)"
    )
}
