//! Provisioning runs against the in-memory store.

use chrono::{DateTime, TimeZone, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, DateTime as BsonDateTime, Document};
use serde_json::json;

use mongo_bootstrap_core::{AppUser, SeedBatch};
use mongo_bootstrap_store::{
    DocumentStore, MemoryStore, ProvisionError, ProvisionPlan, Provisioner, Step, StoreError,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap()
}

async fn provisioned() -> Provisioner<MemoryStore> {
    let provisioner = Provisioner::new(MemoryStore::new("myapp"), ProvisionPlan::default());
    provisioner.run(now()).await.unwrap();
    provisioner
}

fn user(username: &str, email: &str) -> Document {
    doc! {
        "username": username,
        "email": email,
        "createdAt": BsonDateTime::now(),
    }
}

fn product(price: f64, stock: i32) -> Document {
    doc! {
        "name": "Keyboard",
        "price": price,
        "category": "Electronics",
        "stock": stock,
        "createdAt": BsonDateTime::now(),
    }
}

fn order(status: &str) -> Document {
    doc! {
        "userId": ObjectId::new(),
        "products": [{ "productId": ObjectId::new(), "quantity": 2, "price": 10.5 }],
        "totalAmount": 21.0,
        "status": status,
        "createdAt": BsonDateTime::now(),
    }
}

// ============================================================================
// Full Run
// ============================================================================

#[tokio::test]
async fn default_plan_provisions_everything() {
    let provisioner = Provisioner::new(MemoryStore::new("myapp"), ProvisionPlan::default());

    let report = provisioner.run(now()).await.unwrap();

    assert_eq!(report.database, "myapp");
    assert_eq!(report.user, "appuser");
    assert_eq!(report.collections, ["users", "products", "orders"]);
    assert_eq!(report.indexes.len(), 6);
    assert!(report.indexes.contains(&"users.username_1".to_string()));
    assert!(report.indexes.contains(&"orders.createdAt_-1".to_string()));
    assert_eq!(report.inserted, [("users".to_string(), 2), ("products".to_string(), 2)]);
    assert_eq!(report.inserted_total(), 4);

    let store = provisioner.store();
    assert!(store.has_user("appuser").unwrap());
    assert_eq!(store.index_names("users").unwrap(), ["username_1", "email_1"]);

    let users = store.documents("users").unwrap();
    let stamp = BsonDateTime::from_millis(now().timestamp_millis());
    assert_eq!(users[0].get_str("username").unwrap(), "john_doe");
    assert_eq!(users[1].get_datetime("updatedAt").unwrap(), &stamp);
    assert!(store.documents("orders").unwrap().is_empty());
}

#[tokio::test]
async fn second_run_fails_at_user_step() {
    let provisioner = provisioned().await;

    let err = provisioner.run(now()).await.unwrap_err();

    assert_eq!(err.step(), Some(Step::CreateUser));
    assert!(matches!(err.store_error(), Some(StoreError::UserExists { .. })));
    // nothing from the second run landed
    assert_eq!(provisioner.store().documents("users").unwrap().len(), 2);
}

#[tokio::test]
async fn second_run_with_new_user_fails_at_collection_step() {
    let store = MemoryStore::new("myapp");
    Provisioner::new(&store, ProvisionPlan::default())
        .run(now())
        .await
        .unwrap();

    let plan = ProvisionPlan {
        app_user: AppUser::read_write("reporting", "secret"),
        ..ProvisionPlan::default()
    };
    let err = Provisioner::new(&store, plan).run(now()).await.unwrap_err();

    let ProvisionError::StepFailed { step, target, source } = &err else {
        panic!("expected a step failure, got {err:?}");
    };
    assert_eq!(*step, Step::CreateCollection);
    assert_eq!(target, "users");
    assert!(matches!(source, StoreError::CollectionExists(_)));
}

#[tokio::test]
async fn failure_midway_leaves_partial_state() {
    let mut plan = ProvisionPlan::default();
    plan.seeds.push(SeedBatch::new(
        "products",
        vec![json!({ "name": "Broken", "price": -1, "category": "X", "createdAt": { "$date": "2024-01-01T00:00:00Z" } })],
    ));
    let provisioner = Provisioner::new(MemoryStore::new("myapp"), plan);

    let err = provisioner.run(now()).await.unwrap_err();

    assert_eq!(err.step(), Some(Step::InsertSeeds));
    assert!(matches!(
        err.store_error(),
        Some(StoreError::ValidationFailed { .. })
    ));
    let store = provisioner.store();
    assert_eq!(store.documents("users").unwrap().len(), 2);
    assert_eq!(store.documents("products").unwrap().len(), 2);
}

#[tokio::test]
async fn malformed_seed_is_rejected_before_any_step() {
    let mut plan = ProvisionPlan::default();
    plan.seeds.push(SeedBatch::new("users", vec![json!("not a document")]));
    let provisioner = Provisioner::new(MemoryStore::new("myapp"), plan);

    let err = provisioner.run(now()).await.unwrap_err();

    assert!(matches!(err, ProvisionError::InvalidPlan(_)));
    assert_eq!(err.step(), None);
    assert!(!provisioner.store().has_user("appuser").unwrap());
}

// ============================================================================
// Enforcement After Provisioning
// ============================================================================

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let provisioner = provisioned().await;

    let err = provisioner
        .store()
        .insert_many("users", vec![user("john_doe", "other@example.com")])
        .await
        .unwrap_err();

    let StoreError::DuplicateKey { index, .. } = &err else {
        panic!("expected duplicate key, got {err:?}");
    };
    assert_eq!(index, "username_1");
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let provisioner = provisioned().await;

    let err = provisioner
        .store()
        .insert_many("users", vec![user("johnny", "john@example.com")])
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::DuplicateKey { ref index, .. } if index == "email_1"));
}

#[tokio::test]
async fn new_unique_user_is_accepted() {
    let provisioner = provisioned().await;

    let inserted = provisioner
        .store()
        .insert_many("users", vec![user("alice", "alice@example.org")])
        .await
        .unwrap();

    assert_eq!(inserted, 1);
}

#[tokio::test]
async fn negative_price_or_stock_is_rejected() {
    let provisioner = provisioned().await;
    let store = provisioner.store();

    for document in [product(-1.0, 5), product(5.0, -1)] {
        let err = store.insert_many("products", vec![document]).await.unwrap_err();
        assert!(matches!(err, StoreError::ValidationFailed { .. }), "{err:?}");
    }
    assert_eq!(store.documents("products").unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_order_status_is_rejected() {
    let provisioner = provisioned().await;
    let store = provisioner.store();

    let err = store
        .insert_many("orders", vec![order("unknown")])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ValidationFailed { ref reason, .. } if reason.contains("status")));

    assert_eq!(
        store.insert_many("orders", vec![order("shipped")]).await.unwrap(),
        1
    );
}
