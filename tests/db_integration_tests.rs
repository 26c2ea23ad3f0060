//! 数据库集成测试
//!
//! 需要可用的 PostgreSQL（TEST_DATABASE_URL），默认忽略：
//! `cargo test -- --ignored`

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use jewelry_commerce::{
    db,
    error::AppError,
    models::{user::CreateUserRequest, EntityKind, Role},
    policy::{constraints::constraint_name, SoftDeletePolicy},
    repository::EntityRepository,
    routes::create_router,
};
use serde_json::{json, Map, Value};
use serial_test::serial;
use std::sync::Arc;
use uuid::Uuid;

mod common;
use common::{actor, bearer_for, create_test_app_state, create_test_config, setup_test_db};
use tower::ServiceExt;

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {}", other),
    }
}

fn record_id(record: &Value) -> Uuid {
    record["id"].as_str().and_then(|s| Uuid::parse_str(s).ok()).expect("record id")
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_bootstrap_is_idempotent() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let policy = SoftDeletePolicy::new();

    // 先移除约束并写入不一致数据
    sqlx::query(&format!(
        "ALTER TABLE products DROP CONSTRAINT IF EXISTS {}",
        constraint_name(EntityKind::Product)
    ))
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO products (name, is_active, is_deleted) VALUES ('Broken pearl', TRUE, TRUE)")
        .execute(&pool)
        .await
        .unwrap();

    let first = db::bootstrap_consistency(&pool, &policy, &config).await.unwrap();
    assert!(first.is_clean());
    assert!(first.normalized_rows >= 1);

    let (active,): (bool,) = sqlx::query_as("SELECT is_active FROM products WHERE name = 'Broken pearl'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(!active);

    let second = db::bootstrap_consistency(&pool, &policy, &config).await.unwrap();
    assert!(second.is_clean());
    assert_eq!(second.normalized_rows, 0);
    assert!(second.installed.is_empty());
    assert_eq!(second.already_present.len(), policy.enforced().len());

    // 约束生效后，绕过写入路径的不一致数据会被数据库拒绝
    let rejected = sqlx::query("INSERT INTO products (name, is_active, is_deleted) VALUES ('Bad', TRUE, TRUE)")
        .execute(&pool)
        .await;
    assert!(rejected.is_err());
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_soft_delete_and_restore_round_trip() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let repo = EntityRepository::new(pool.clone(), EntityKind::Product, Arc::new(SoftDeletePolicy::new()));
    let vendor = actor("vendor-7", Role::Vendor).with_display_name("Lune Atelier");

    let created = repo
        .create(Some(&vendor), object(json!({"name": "Opal ring", "price": 120})))
        .await
        .unwrap();
    assert_eq!(created["isActive"], json!(true));
    assert_eq!(created["isDeleted"], json!(false));
    assert_eq!(created["createdBy"], json!("Lune Atelier"));

    let id = record_id(&created);

    let deleted = repo.soft_delete(Some(&vendor), id).await.unwrap().unwrap();
    assert_eq!(deleted["isActive"], json!(false));
    assert_eq!(deleted["isDeleted"], json!(true));
    assert!(deleted["deletedAt"].is_string());
    assert_eq!(deleted["deletedBy"], json!("vendor-7"));

    // 再次软删除保持原样
    let again = repo.soft_delete(Some(&vendor), id).await.unwrap().unwrap();
    assert_eq!(again["deletedAt"], deleted["deletedAt"]);

    let listed = repo.list(&Default::default()).await.unwrap();
    assert!(listed.iter().all(|r| record_id(r) != id));

    let restored = repo.restore(Some(&vendor), id).await.unwrap().unwrap();
    assert_eq!(restored["isActive"], json!(true));
    assert_eq!(restored["isDeleted"], json!(false));
    assert_eq!(restored["deletedAt"], Value::Null);
    assert_eq!(restored["deletedBy"], Value::Null);
    assert_eq!(restored["updatedBy"], json!("Lune Atelier"));
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_upsert_creates_then_updates() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let repo = EntityRepository::new(pool.clone(), EntityKind::Collection, Arc::new(SoftDeletePolicy::new()));
    let admin = actor("admin-1", Role::Admin);
    let id = Uuid::new_v4();

    let created = repo
        .upsert(
            Some(&admin),
            id,
            object(json!({"name": "Spring"})),
            object(json!({"isActive": false})),
        )
        .await
        .unwrap();
    assert_eq!(record_id(&created), id);
    assert_eq!(created["createdBy"], json!("admin-1"));
    assert_eq!(created["updatedBy"], json!("admin-1"));
    assert_eq!(created["isActive"], json!(true));

    let updated = repo
        .upsert(
            Some(&admin),
            id,
            object(json!({"name": "Spring"})),
            object(json!({"isActive": false})),
        )
        .await
        .unwrap();
    assert_eq!(updated["isActive"], json!(false));
    assert_eq!(updated["isDeleted"], json!(true));
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_hard_delete_restricted_to_top_role() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let state = create_test_app_state(config, pool);

    let admin = actor(&Uuid::new_v4().to_string(), Role::Admin);
    let record = state
        .record_service
        .create(&admin, EntityKind::Article, json!({"title": "Caring for pearls"}))
        .await
        .unwrap();
    let id = record_id(&record);

    let err = state
        .record_service
        .hard_delete(&admin, EntityKind::Article, id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert!(state.record_service.get(EntityKind::Article, id).await.is_ok());

    let root = actor(&Uuid::new_v4().to_string(), Role::SuperAdmin);
    state
        .record_service
        .hard_delete(&root, EntityKind::Article, id)
        .await
        .unwrap();
    assert!(matches!(
        state.record_service.get(EntityKind::Article, id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_vendor_creates_admin_for_own_vendor_only() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let state = create_test_app_state(config, pool.clone());

    let vendor_user = Uuid::new_v4();
    let vendor = actor(&vendor_user.to_string(), Role::Vendor);
    let own_vendor: (Uuid,) = sqlx::query_as("INSERT INTO vendors (name, owner_id) VALUES ('Lune', $1) RETURNING id")
        .bind(vendor_user)
        .fetch_one(&pool)
        .await
        .unwrap();
    let other_vendor: (Uuid,) =
        sqlx::query_as("INSERT INTO vendors (name, owner_id) VALUES ('Sol', $1) RETURNING id")
            .bind(Uuid::new_v4())
            .fetch_one(&pool)
            .await
            .unwrap();

    let request = |vendor_id: Uuid, email: &str| -> CreateUserRequest {
        serde_json::from_value(json!({
            "email": email,
            "password": "CorrectHorse9",
            "role": "ADMIN",
            "vendorId": vendor_id
        }))
        .unwrap()
    };

    let created = state
        .user_service
        .create_user(&vendor, request(own_vendor.0, "shop-admin@example.com"))
        .await
        .unwrap();
    assert_eq!(created.role, "ADMIN");

    let denied = state
        .user_service
        .create_user(&vendor, request(other_vendor.0, "intruder@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(denied, AppError::Forbidden(_)));

    let duplicate = state
        .user_service
        .create_user(&vendor, request(own_vendor.0, "shop-admin@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(duplicate, AppError::Conflict(_)));
}

async fn patch_as(
    state: &Arc<jewelry_commerce::middleware::AppState>,
    who: &jewelry_commerce::models::Actor,
    uri: &str,
    body: Value,
) -> StatusCode {
    create_router(state.clone())
        .oneshot(
            Request::builder()
                .method(Method::PATCH)
                .uri(uri)
                .header(header::AUTHORIZATION, bearer_for(state, who))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_vendor_cannot_patch_foreign_product() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let state = create_test_app_state(config, pool);

    let owner = actor(&Uuid::new_v4().to_string(), Role::Vendor);
    let rival = actor(&Uuid::new_v4().to_string(), Role::Vendor);
    let product = state
        .record_service
        .create(&owner, EntityKind::Product, json!({"name": "Tahitian strand"}))
        .await
        .unwrap();
    let uri = format!("/api/v1/records/products/{}", record_id(&product));

    let status = patch_as(&state, &rival, &uri, json!({"price": 1})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let status = patch_as(&state, &owner, &uri, json!({"price": 1250})).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_user_cannot_patch_foreign_review() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let state = create_test_app_state(config, pool);

    let author = actor(&Uuid::new_v4().to_string(), Role::User);
    let stranger = actor(&Uuid::new_v4().to_string(), Role::User);
    let review = state
        .record_service
        .create(&author, EntityKind::Review, json!({"rating": 5, "body": "Flawless clasp"}))
        .await
        .unwrap();
    assert_eq!(review["userId"], json!(author.id));
    let uri = format!("/api/v1/records/reviews/{}", record_id(&review));

    let status = patch_as(&state, &stranger, &uri, json!({"rating": 1})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let status = patch_as(&state, &author, &uri, json!({"rating": 4})).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_vendor_cannot_reassign_ownership() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let state = create_test_app_state(config, pool.clone());

    let vendor_user = Uuid::new_v4();
    let vendor = actor(&vendor_user.to_string(), Role::Vendor);
    let other_vendor: (Uuid,) =
        sqlx::query_as("INSERT INTO vendors (name, owner_id) VALUES ('Sol', $1) RETURNING id")
            .bind(Uuid::new_v4())
            .fetch_one(&pool)
            .await
            .unwrap();

    let denied = state
        .record_service
        .create(
            &vendor,
            EntityKind::Product,
            json!({"name": "Borrowed ring", "vendorId": other_vendor.0}),
        )
        .await
        .unwrap_err();
    assert!(matches!(denied, AppError::Forbidden(_)));

    let someone_else = Uuid::new_v4().to_string();
    let product = state
        .record_service
        .create(
            &vendor,
            EntityKind::Product,
            json!({"name": "Own ring", "ownerId": someone_else, "createdById": someone_else}),
        )
        .await
        .unwrap();
    assert_eq!(product["ownerId"], json!(vendor.id));
    assert_eq!(product["createdById"], json!(vendor.id));

    let updated = state
        .record_service
        .update(
            &vendor,
            EntityKind::Product,
            record_id(&product),
            json!({"ownerId": someone_else, "createdBy": "forged"}),
        )
        .await
        .unwrap();
    assert_eq!(updated["ownerId"], json!(vendor.id));
    assert_ne!(updated["createdBy"], json!("forged"));
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_deactivated_user_cannot_restore_self_or_write() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let state = create_test_app_state(config, pool);

    let root = actor(&Uuid::new_v4().to_string(), Role::SuperAdmin);
    let request: CreateUserRequest = serde_json::from_value(json!({
        "email": "shopper@example.com",
        "password": "CorrectHorse9",
        "role": "USER"
    }))
    .unwrap();
    let user = state.user_service.create_user(&root, request).await.unwrap();
    let me = actor(&user.id.to_string(), Role::User);

    // 本人可以停用自己，但不能恢复
    state.user_service.soft_delete_user(&me, user.id).await.unwrap();

    let restore = state.user_service.restore_user(&me, user.id).await.unwrap_err();
    assert!(matches!(restore, AppError::Forbidden(_)));

    let write = state
        .record_service
        .create(&me, EntityKind::Review, json!({"rating": 5}))
        .await
        .unwrap_err();
    assert!(matches!(write, AppError::Forbidden(_)));

    let restored = state.user_service.restore_user(&root, user.id).await.unwrap();
    assert!(restored.lifecycle.is_active);
    assert!(!restored.lifecycle.is_deleted);
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_invalid_column_values_are_bad_requests() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let state = create_test_app_state(config, pool);
    let admin = actor(&Uuid::new_v4().to_string(), Role::Admin);

    for payload in [
        json!({"name": "Cuff", "price": "expensive"}),
        json!({"price": 10}),
    ] {
        let err = state
            .record_service
            .create(&admin, EntityKind::Product, payload.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)), "{} -> {:?}", payload, err);
    }

    let user = actor(&Uuid::new_v4().to_string(), Role::User);
    let err = state
        .record_service
        .create(&user, EntityKind::Review, json!({"rating": 9}))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_create_audit_entry_carries_record_id() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let state = create_test_app_state(config, pool.clone());
    let admin = actor(&Uuid::new_v4().to_string(), Role::Admin);

    let response = create_router(state.clone())
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/records/collections")
                .header(header::AUTHORIZATION, bearer_for(&state, &admin))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"name": "Bridal"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let bytes = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    let created: Value = serde_json::from_slice(&bytes).unwrap();

    let (entity_id,): (Option<String>,) =
        sqlx::query_as("SELECT entity_id FROM audit_logs WHERE entity = 'collections' AND action = 'create'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(entity_id.as_deref(), created["id"].as_str());
}
