use storage::{ProgressStore, SqliteStore};

#[tokio::test]
async fn sqlite_store_roundtrips_values() {
    let store = SqliteStore::connect("sqlite::memory:").await.unwrap();

    assert_eq!(store.load("flipcard:progress").await.unwrap(), None);

    store
        .save("flipcard:progress", "{\"total_attempts\":3}")
        .await
        .unwrap();
    assert_eq!(
        store.load("flipcard:progress").await.unwrap().as_deref(),
        Some("{\"total_attempts\":3}")
    );
}

#[tokio::test]
async fn sqlite_store_overwrites_on_conflict() {
    let store = SqliteStore::connect("sqlite::memory:").await.unwrap();

    store.save("k", "first").await.unwrap();
    store.save("k", "second").await.unwrap();

    assert_eq!(store.load("k").await.unwrap().as_deref(), Some("second"));
}

#[tokio::test]
async fn keys_are_independent() {
    let store = SqliteStore::connect("sqlite::memory:").await.unwrap();

    store.save("flipcard:progress", "p").await.unwrap();
    store.save("flipcard:cards", "c").await.unwrap();

    assert_eq!(
        store.load("flipcard:progress").await.unwrap().as_deref(),
        Some("p")
    );
    assert_eq!(store.load("flipcard:cards").await.unwrap().as_deref(), Some("c"));
}
