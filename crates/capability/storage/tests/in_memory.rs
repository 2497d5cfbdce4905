use mqsink_storage::{InMemoryMessageStore, MessageStore, StoredRow};

fn sample_row(topic: &str, received_at_ms: i64) -> StoredRow {
    StoredRow {
        received_at_ms,
        topic: topic.to_string(),
        qos: 1,
        retained: false,
        client_id: Some("bridge-1".to_string()),
        payload_text: Some("{\"v\":22.5}".to_string()),
        payload_bytes: b"{\"v\":22.5}".to_vec(),
        user_properties: "{}".to_string(),
    }
}

#[tokio::test]
async fn provisioning_twice_is_idempotent() {
    let store = InMemoryMessageStore::new();
    let first = store.provision_schema().await.expect("first");
    assert!(first.table_created);
    assert_eq!(first.indexes_created, 2);

    let second = store.provision_schema().await.expect("second");
    assert!(second.is_noop());
}

#[tokio::test]
async fn rows_are_appended_in_order() {
    let store = InMemoryMessageStore::new();
    store.insert_row(&sample_row("sensors/temp", 1000)).await.expect("insert");
    store.insert_row(&sample_row("sensors/hum", 2000)).await.expect("insert");

    let rows = store.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].topic, "sensors/temp");
    assert_eq!(rows[1].topic, "sensors/hum");
    assert_eq!(rows[1].received_at_ms, 2000);
}

#[tokio::test]
async fn empty_payload_row_keeps_empty_bytes() {
    let store = InMemoryMessageStore::new();
    let row = StoredRow {
        payload_text: Some(String::new()),
        payload_bytes: Vec::new(),
        ..sample_row("sensors/empty", 3000)
    };
    store.insert_row(&row).await.expect("insert");
    let rows = store.rows();
    assert_eq!(rows[0].payload_bytes, Vec::<u8>::new());
    assert_eq!(rows[0].payload_text.as_deref(), Some(""));
}
