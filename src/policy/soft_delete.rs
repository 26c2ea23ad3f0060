//! Soft-delete consistency enforcer (write path)
//!
//! Every write to an opted-in table passes through [`SoftDeletePolicy::apply`]
//! before it reaches storage. The function is pure: it only looks at the actor,
//! the kind of write and the outgoing payload, and rewrites the payload so that
//! `isActive == !isDeleted` holds and the lifecycle/audit columns are stamped.

use crate::models::{Actor, EntityKind};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;

pub const IS_ACTIVE: &str = "isActive";
pub const IS_DELETED: &str = "isDeleted";
pub const CREATED_BY: &str = "createdBy";
/// Stable creator identity; `createdBy` is for display only
pub const CREATED_BY_ID: &str = "createdById";
pub const UPDATED_BY: &str = "updatedBy";
pub const DELETED_BY: &str = "deletedBy";
pub const DELETED_AT: &str = "deletedAt";

/// Upsert payloads carry one object per branch
pub const UPSERT_CREATE: &str = "create";
pub const UPSERT_UPDATE: &str = "update";

/// Tables participating in enforcement. Engagement tables stay outside.
pub const ENFORCED_ENTITIES: [EntityKind; 8] = [
    EntityKind::User,
    EntityKind::Vendor,
    EntityKind::Product,
    EntityKind::Collection,
    EntityKind::Article,
    EntityKind::ShippingMethod,
    EntityKind::Review,
    EntityKind::NewsletterSubscriber,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Update,
    UpdateMany,
    Upsert,
}

impl WriteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteKind::Create => "create",
            WriteKind::Update => "update",
            WriteKind::UpdateMany => "update_many",
            WriteKind::Upsert => "upsert",
        }
    }
}

/// Inputs to one enforcement pass
#[derive(Debug, Clone, Copy)]
pub struct WriteContext<'a> {
    pub actor: Option<&'a Actor>,
    pub kind: WriteKind,
    pub now: DateTime<Utc>,
}

impl<'a> WriteContext<'a> {
    pub fn new(actor: Option<&'a Actor>, kind: WriteKind) -> Self {
        Self {
            actor,
            kind,
            now: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SoftDeletePolicy {
    enforced: HashSet<EntityKind>,
}

impl Default for SoftDeletePolicy {
    fn default() -> Self {
        Self::with_entities(ENFORCED_ENTITIES)
    }
}

impl SoftDeletePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entities(entities: impl IntoIterator<Item = EntityKind>) -> Self {
        Self {
            enforced: entities.into_iter().collect(),
        }
    }

    pub fn enforces(&self, entity: EntityKind) -> bool {
        self.enforced.contains(&entity)
    }

    /// Enforced entities in declaration order
    pub fn enforced(&self) -> Vec<EntityKind> {
        EntityKind::ALL
            .into_iter()
            .filter(|k| self.enforced.contains(k))
            .collect()
    }

    /// Rewrite `payload` for a write against `entity`.
    ///
    /// Entities outside the allow-list are left untouched.
    pub fn apply(&self, entity: EntityKind, ctx: &WriteContext<'_>, payload: &mut Map<String, Value>) {
        if !self.enforces(entity) {
            return;
        }

        match ctx.kind {
            WriteKind::Create => apply_branch(payload, ctx, Branch::Create),
            WriteKind::Update | WriteKind::UpdateMany => apply_branch(payload, ctx, Branch::Update),
            WriteKind::Upsert => {
                if let Some(Value::Object(create)) = payload.get_mut(UPSERT_CREATE) {
                    apply_branch(create, ctx, Branch::UpsertCreate);
                }
                if let Some(Value::Object(update)) = payload.get_mut(UPSERT_UPDATE) {
                    apply_branch(update, ctx, Branch::Update);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Branch {
    Create,
    Update,
    UpsertCreate,
}

fn apply_branch(payload: &mut Map<String, Value>, ctx: &WriteContext<'_>, branch: Branch) {
    // isDeleted wins when both flags are literal booleans
    let deleted_flag = payload.get(IS_DELETED).and_then(Value::as_bool);
    let active_flag = payload.get(IS_ACTIVE).and_then(Value::as_bool);

    let deleted = match (deleted_flag, active_flag) {
        (Some(deleted), _) => {
            payload.insert(IS_ACTIVE.to_string(), Value::Bool(!deleted));
            Some(deleted)
        }
        (None, Some(active)) => {
            payload.insert(IS_DELETED.to_string(), Value::Bool(!active));
            Some(!active)
        }
        (None, None) => None,
    };

    match deleted {
        Some(true) => {
            if is_absent(payload, DELETED_AT) {
                payload.insert(DELETED_AT.to_string(), timestamp(ctx.now));
            }
            if let Some(actor) = ctx.actor {
                if is_absent(payload, DELETED_BY) {
                    payload.insert(DELETED_BY.to_string(), Value::String(actor.id.clone()));
                }
            }
        }
        Some(false) => {
            payload.insert(DELETED_AT.to_string(), Value::Null);
            payload.insert(DELETED_BY.to_string(), Value::Null);
        }
        None => {}
    }

    // The creator identity is fixed at insert time
    if branch == Branch::Update {
        payload.remove(CREATED_BY_ID);
    }

    let Some(actor) = ctx.actor else {
        return;
    };

    let attribution = || Value::String(actor.attribution().to_string());
    match branch {
        Branch::Create => stamp_if_absent(payload, CREATED_BY, attribution),
        Branch::Update => stamp_if_absent(payload, UPDATED_BY, attribution),
        Branch::UpsertCreate => {
            stamp_if_absent(payload, CREATED_BY, attribution);
            stamp_if_absent(payload, UPDATED_BY, attribution);
        }
    }

    if branch != Branch::Update {
        payload.insert(CREATED_BY_ID.to_string(), Value::String(actor.id.clone()));
    }
}

fn is_absent(payload: &Map<String, Value>, field: &str) -> bool {
    matches!(payload.get(field), None | Some(Value::Null))
}

fn stamp_if_absent(payload: &mut Map<String, Value>, field: &str, value: impl Fn() -> Value) {
    if is_absent(payload, field) {
        payload.insert(field.to_string(), value());
    }
}

fn timestamp(now: DateTime<Utc>) -> Value {
    Value::String(now.to_rfc3339_opts(SecondsFormat::Micros, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    fn admin() -> Actor {
        Actor::new("7", "ADMIN").with_display_name("Mara Quinn")
    }

    fn apply(kind: WriteKind, actor: Option<&Actor>, payload: Value) -> Map<String, Value> {
        let mut payload = object(payload);
        let ctx = WriteContext::new(actor, kind);
        SoftDeletePolicy::new().apply(EntityKind::Product, &ctx, &mut payload);
        payload
    }

    #[test]
    fn test_is_deleted_forces_is_active() {
        let kinds = [WriteKind::Create, WriteKind::Update, WriteKind::UpdateMany];
        let actives = [json!(true), json!(false), json!(null), json!("yes")];

        for kind in kinds {
            for deleted in [true, false] {
                for active in &actives {
                    let out = apply(kind, None, json!({ "isDeleted": deleted, "isActive": active }));
                    assert_eq!(out[IS_ACTIVE], json!(!deleted), "{:?} {} {}", kind, deleted, active);
                    assert_eq!(out[IS_DELETED], json!(deleted));
                }
            }
        }
    }

    #[test]
    fn test_is_active_alone_derives_is_deleted() {
        for active in [true, false] {
            let out = apply(WriteKind::Update, None, json!({ "isActive": active }));
            assert_eq!(out[IS_DELETED], json!(!active));
        }
    }

    #[test]
    fn test_no_flags_no_inference() {
        let out = apply(WriteKind::Update, None, json!({ "name": "Opal Ring" }));
        assert!(!out.contains_key(IS_ACTIVE));
        assert!(!out.contains_key(IS_DELETED));
        assert!(!out.contains_key(DELETED_AT));
    }

    #[test]
    fn test_string_flags_are_not_literals() {
        let out = apply(WriteKind::Update, None, json!({ "isDeleted": "true" }));
        assert_eq!(out[IS_DELETED], json!("true"));
        assert!(!out.contains_key(IS_ACTIVE));
    }

    #[test]
    fn test_soft_delete_stamps_actor_and_time() {
        let actor = admin();
        let out = apply(WriteKind::Update, Some(&actor), json!({ "isDeleted": true }));
        assert_eq!(out[IS_ACTIVE], json!(false));
        assert_eq!(out[DELETED_BY], json!("7"));
        assert!(out[DELETED_AT].is_string());
        assert_eq!(out[UPDATED_BY], json!("Mara Quinn"));
    }

    #[test]
    fn test_soft_delete_without_actor_leaves_deleted_by() {
        let out = apply(WriteKind::Update, None, json!({ "isDeleted": true }));
        assert!(!out.contains_key(DELETED_BY));
        assert!(out[DELETED_AT].is_string());
        assert!(!out.contains_key(UPDATED_BY));
    }

    #[test]
    fn test_soft_delete_then_restore() {
        let actor = admin();
        let deleted = apply(WriteKind::Update, Some(&actor), json!({ "isDeleted": true }));
        assert_eq!(deleted[IS_ACTIVE], json!(false));
        assert_eq!(deleted[DELETED_BY], json!("7"));

        let restored = apply(
            WriteKind::Update,
            Some(&actor),
            json!({ "isDeleted": false, "deletedAt": "2024-01-01T00:00:00Z" }),
        );
        assert_eq!(restored[IS_ACTIVE], json!(true));
        assert_eq!(restored[DELETED_AT], Value::Null);
        assert_eq!(restored[DELETED_BY], Value::Null);
    }

    #[test]
    fn test_create_attribution() {
        let actor = admin();
        let out = apply(WriteKind::Create, Some(&actor), json!({ "name": "Pearl Strand" }));
        assert_eq!(out[CREATED_BY], json!("Mara Quinn"));
        assert!(!out.contains_key(UPDATED_BY));

        let bare = Actor::new("11", "VENDOR");
        let out = apply(WriteKind::Create, Some(&bare), json!({ "name": "Pearl Strand" }));
        assert_eq!(out[CREATED_BY], json!("11"));
    }

    #[test]
    fn test_explicit_created_by_is_kept() {
        let actor = admin();
        let out = apply(
            WriteKind::Create,
            Some(&actor),
            json!({ "name": "Pearl Strand", "createdBy": "VENDOR:11" }),
        );
        assert_eq!(out[CREATED_BY], json!("VENDOR:11"));
    }

    #[test]
    fn test_creator_id_comes_from_actor_only() {
        let actor = admin();
        let out = apply(
            WriteKind::Create,
            Some(&actor),
            json!({ "name": "Pearl Strand", "createdById": "someone-else" }),
        );
        assert_eq!(out[CREATED_BY_ID], json!("7"));

        let out = apply(WriteKind::Update, Some(&actor), json!({ "createdById": "someone-else" }));
        assert!(!out.contains_key(CREATED_BY_ID));

        let out = apply(
            WriteKind::Upsert,
            Some(&actor),
            json!({ "create": {}, "update": { "createdById": "x" } }),
        );
        assert_eq!(out[UPSERT_CREATE][CREATED_BY_ID], json!("7"));
        assert!(out[UPSERT_UPDATE].get(CREATED_BY_ID).is_none());
    }

    #[test]
    fn test_update_many_stamps_updated_by() {
        let actor = admin();
        let out = apply(WriteKind::UpdateMany, Some(&actor), json!({ "isActive": false }));
        assert_eq!(out[UPDATED_BY], json!("Mara Quinn"));
        assert_eq!(out[IS_DELETED], json!(true));
        assert!(!out.contains_key(CREATED_BY));
    }

    #[test]
    fn test_upsert_applies_to_both_branches() {
        let actor = admin();
        let out = apply(
            WriteKind::Upsert,
            Some(&actor),
            json!({
                "create": { "name": "Gold Hoops", "isActive": true },
                "update": { "isDeleted": true }
            }),
        );

        let create = out[UPSERT_CREATE].as_object().unwrap();
        assert_eq!(create[IS_DELETED], json!(false));
        assert_eq!(create[CREATED_BY], json!("Mara Quinn"));
        assert_eq!(create[UPDATED_BY], json!("Mara Quinn"));

        let update = out[UPSERT_UPDATE].as_object().unwrap();
        assert_eq!(update[IS_ACTIVE], json!(false));
        assert_eq!(update[DELETED_BY], json!("7"));
        assert_eq!(update[UPDATED_BY], json!("Mara Quinn"));
    }

    #[test]
    fn test_entities_outside_allow_list_untouched() {
        let actor = admin();
        let mut payload = object(json!({ "isDeleted": true }));
        let ctx = WriteContext::new(Some(&actor), WriteKind::Create);
        SoftDeletePolicy::new().apply(EntityKind::Like, &ctx, &mut payload);

        assert_eq!(Value::Object(payload), json!({ "isDeleted": true }));
    }

    #[test]
    fn test_enforced_order_is_stable() {
        let policy = SoftDeletePolicy::new();
        assert_eq!(policy.enforced(), ENFORCED_ENTITIES.to_vec());
        assert!(!policy.enforces(EntityKind::Bookmark));
        assert!(!policy.enforces(EntityKind::ProductView));
    }
}
