use std::sync::Arc;

use curriculum_core::ClassCatalog;
use curriculum_core::model::{AccessStatus, Category, ClassId, UserClassAccess, UserId};
use curriculum_core::time::fixed_now;
use storage::repository::{KeyValueStore, Storage};
use storage::sqlite::SqliteRepository;
use storage::{AccessStore, StorageError};

fn registered(user: &UserId, catalog: &ClassCatalog) -> Vec<UserClassAccess> {
    catalog
        .available_classes()
        .iter()
        .map(|class| {
            let selected = class.id().as_str() == "grade1_math";
            let status = if selected {
                AccessStatus::Active
            } else {
                AccessStatus::Locked
            };
            UserClassAccess::for_registration(user.clone(), class, status, selected, fixed_now())
        })
        .collect()
}

#[tokio::test]
async fn sqlite_roundtrip_persists_access_blob() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_access?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let catalog = ClassCatalog::standard().unwrap();
    let user = UserId::new("u1").unwrap();
    let mut records = registered(&user, &catalog);

    let grade1_id = ClassId::new("grade1_math").unwrap();
    let grade1 = catalog.get_class(&grade1_id).unwrap();
    let pos = records
        .iter()
        .position(|r| r.class_id() == &grade1_id)
        .unwrap();
    records[pos]
        .apply_category_result(grade1, Category::Arithmetic, 180, true, fixed_now())
        .unwrap();

    let store = AccessStore::new(Arc::new(repo.clone()));
    store.save(&user, &records).await.expect("save");

    let loaded = store.load(&user).await.expect("load");
    assert_eq!(loaded, records);
    assert_eq!(loaded[pos].status(), AccessStatus::Completed);
    assert_eq!(loaded[pos].current_score(), 180);

    // Overwrite replaces the blob rather than appending.
    store.save(&user, &records[..2]).await.expect("overwrite");
    assert_eq!(store.load(&user).await.unwrap().len(), 2);
}

#[tokio::test]
async fn sqlite_migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");

    repo.set("user_class_access_u9", "[]".into()).await.unwrap();
    assert_eq!(
        repo.get("user_class_access_u9").await.unwrap().as_deref(),
        Some("[]")
    );
    assert!(repo.get("user_class_access_missing").await.unwrap().is_none());
}

#[tokio::test]
async fn corrupted_blob_surfaces_serialization_error() {
    let storage = Storage::sqlite("sqlite:file:memdb_corrupt?mode=memory&cache=shared")
        .await
        .expect("storage");
    storage
        .access_blobs
        .set("user_class_access_u1", "[{\"userId\": 42}]".into())
        .await
        .unwrap();

    let store = AccessStore::new(Arc::clone(&storage.access_blobs));
    let err = store
        .load(&UserId::new("u1").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Serialization(_)));
}
