//! Integration tests for row stores and the database nodes built on them

use afinar::autograd::{apply_loss, Change, Feedback};
use afinar::database::Database;
use afinar::optim::step;
use afinar::reasoning::ScriptedReasoner;
use afinar::storage::{InMemoryStore, Rows, Store};
use serde_json::json;
use std::sync::Arc;

fn characters() -> Rows {
    Rows::from([
        ("luna".to_string(), json!("Princess of the day")),
        ("celestia".to_string(), json!("Princess of the day")),
        ("discord".to_string(), json!("Spirit of chaos")),
    ])
}

#[test]
fn test_store_trait_is_object_safe() {
    fn assert_store(_: Arc<dyn Store>) {}
    assert_store(Arc::new(InMemoryStore::new()));
}

#[tokio::test]
async fn test_full_store_lifecycle() {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    assert!(store.is_empty().await.unwrap());

    store.insert(characters()).await.unwrap();
    assert_eq!(store.len().await.unwrap(), 3);

    let previous = store
        .update("luna", json!("Princess of the night"))
        .await
        .unwrap();
    assert_eq!(previous, Some(json!("Princess of the day")));

    // Updating a missing row never creates it
    assert_eq!(store.update("twilight", json!("Student")).await.unwrap(), None);
    assert!(!store.contains("twilight").await.unwrap());

    assert!(store.delete("discord").await.unwrap());
    assert!(!store.delete("discord").await.unwrap());
    assert_eq!(store.len().await.unwrap(), 2);

    let hits = store.query("tell me about luna", 5).await.unwrap();
    assert_eq!(hits, vec![("luna".to_string(), json!("Princess of the night"))]);
}

#[tokio::test]
async fn test_structured_changes_flow_from_loss_to_store() {
    let store = Arc::new(InMemoryStore::with_rows(characters()));
    let reasoner = Arc::new(ScriptedReasoner::new());
    let db = Database::parameter("Characters", store.clone(), reasoner.clone());

    let loss = apply_loss(
        &[db.erase()],
        Feedback::Changes(vec![
            Change::update("Luna", "Princess of the night"),
            Change::delete("discord"),
        ]),
    )
    .await
    .unwrap();

    let applied = step(&loss.erase(), [db.erase()]).await.unwrap();

    assert_eq!(applied, 1);
    assert_eq!(
        store.snapshot(),
        Rows::from([
            ("luna".to_string(), json!("Princess of the night")),
            ("celestia".to_string(), json!("Princess of the day")),
        ])
    );
    assert_eq!(reasoner.call_count(), 0);
}

#[tokio::test]
async fn test_inserted_rows_are_queryable() {
    let store = Arc::new(InMemoryStore::new());
    let db = Database::parameter("Characters", store.clone(), Arc::new(ScriptedReasoner::new()));

    db.insert(characters()).await.unwrap();
    let loss = apply_loss(
        &[db.erase()],
        Feedback::Insert(Rows::from([(
            "twilight".to_string(),
            json!("Princess of friendship"),
        )])),
    )
    .await
    .unwrap();
    step(&loss.erase(), [db.erase()]).await.unwrap();

    assert_eq!(store.len().await.unwrap(), 4);
    assert_eq!(
        db.query("twilight", 1).await.unwrap()[0].1,
        json!("Princess of friendship")
    );
}

#[tokio::test]
async fn test_text_feedback_is_resolved_through_reasoning() {
    let store = Arc::new(InMemoryStore::with_rows(characters()));
    let reasoner = Arc::new(ScriptedReasoner::new());
    reasoner.push_object(json!({
        "changes": [
            {"operation": "UPDATE", "key": "luna", "corrected_data": "Princess of the night"},
            {"operation": "DELETE", "key": "celestia"}
        ]
    }));
    let db = Database::parameter("Characters", store.clone(), reasoner.clone());

    let loss = apply_loss(&[db.erase()], "luna rules the night, not the day")
        .await
        .unwrap();
    step(&loss.erase(), [db.erase()]).await.unwrap();

    // Only the row the text implicated is editable
    assert_eq!(store.get("luna").await.unwrap(), Some(json!("Princess of the night")));
    assert!(store.contains("celestia").await.unwrap());

    let request = &reasoner.requests()[0];
    assert_eq!(
        request.input("DATASET"),
        Some(&json!({"luna": "Princess of the day"}))
    );
}
