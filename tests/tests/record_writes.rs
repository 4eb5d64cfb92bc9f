use pretty_assertions::assert_eq;
use serde_json::json;
use snc_core::transport::Method;
use tests::{connect, FakeInstance};

#[tokio::test]
async fn insert_returns_the_new_sys_id() {
    let instance = FakeInstance::new();
    let (client, _log) = connect(&instance);

    let mut gr = client.glide_record("incident");
    gr.initialize();
    gr.set_value("short_description", "Network is down").unwrap();
    gr.set_value("priority", "1").unwrap();

    let sys_id = gr.insert().await.unwrap().unwrap();
    assert_eq!(sys_id.len(), 32);
    assert!(!gr.is_new_record());
    assert_eq!(gr.sys_id(), Some(sys_id.as_str()));
    assert_eq!(gr.get_value("short_description").unwrap(), "Network is down");

    let stored = instance.row("incident", &sys_id).unwrap();
    assert_eq!(stored["priority"], "1");
}

#[tokio::test]
async fn insert_with_preset_guid() {
    let instance = FakeInstance::new();
    let (client, _log) = connect(&instance);

    let guid = snc::GlideRecord::new_guid();
    let mut gr = client.glide_record("incident");
    gr.initialize();
    gr.set_new_guid_value(&guid).unwrap();
    gr.set_value("short_description", "preset").unwrap();

    assert_eq!(gr.insert().await.unwrap(), Some(guid.clone()));
    assert!(instance.row("incident", &guid).is_some());
}

#[tokio::test]
async fn insert_without_initialize_fails() {
    let instance = FakeInstance::new();
    let (client, log) = connect(&instance);

    let mut gr = client.glide_record("incident");
    let err = gr.insert().await.unwrap_err();
    assert!(err.is_no_record());
    assert!(log.is_empty());
}

#[tokio::test]
async fn update_sends_only_changed_fields() {
    let instance = FakeInstance::new();
    let ids = instance.seed_incidents(1);
    let (client, mut log) = connect(&instance);

    let mut gr = client.glide_record("incident");
    assert!(gr.get(&ids[0]).await.unwrap());
    assert!(!gr.changes());

    gr.set_value("short_description", "updated").unwrap();
    gr.set_value("priority", "1").unwrap();
    assert!(gr.changes());
    log.clear();

    assert_eq!(gr.update().await.unwrap(), Some(ids[0].clone()));

    let exchange = log.pop().unwrap();
    assert_eq!(exchange.method, Method::Patch);
    assert_eq!(exchange.path, format!("/api/now/table/incident/{}", ids[0]));

    let stored = instance.row("incident", &ids[0]).unwrap();
    assert_eq!(stored["short_description"], "updated");

    // The server's copy replaced the local row, so nothing is pending.
    assert!(!gr.changes());
    assert_eq!(gr.get_value("sys_updated_by").unwrap(), "admin");
}

#[tokio::test]
async fn update_without_a_row_fails() {
    let instance = FakeInstance::new();
    let (client, log) = connect(&instance);

    let mut gr = client.glide_record("incident");
    assert!(gr.update().await.unwrap_err().is_no_record());
    assert!(log.is_empty());
}

#[tokio::test]
async fn delete_clears_the_row() {
    let instance = FakeInstance::new();
    let ids = instance.seed_incidents(2);
    let (client, _log) = connect(&instance);

    let mut gr = client.glide_record("incident");
    assert!(gr.get(&ids[1]).await.unwrap());
    assert!(gr.delete().await.unwrap());

    assert_eq!(instance.rows("incident").len(), 1);
    assert!(gr.get_value("number").unwrap_err().is_no_record());
}

#[tokio::test]
async fn write_failures_carry_status_and_message() {
    let instance = FakeInstance::new();
    let ids = instance.seed_incidents(1);
    instance.reject_writes("incident");
    let (client, _log) = connect(&instance);

    let mut gr = client.glide_record("incident");
    gr.initialize();
    gr.set_value("short_description", "nope").unwrap();
    let err = gr.insert().await.unwrap_err();
    assert!(err.is_insert());
    assert_eq!(err.status(), Some(403));
    assert!(err.to_string().contains("aborted by Business Rule"));

    assert!(gr.get(&ids[0]).await.unwrap());
    gr.set_value("priority", "3").unwrap();
    let err = gr.update().await.unwrap_err();
    assert!(err.is_update());

    let err = gr.delete().await.unwrap_err();
    assert!(err.is_delete());
    assert_eq!(instance.rows("incident").len(), 1);
}

#[tokio::test]
async fn get_missing_record_is_false() {
    let instance = FakeInstance::new();
    instance.seed_incidents(1);
    let (client, _log) = connect(&instance);

    let mut gr = client.glide_record("incident");
    assert!(!gr.get("00000000000000000000000000000000").await.unwrap());
}

#[tokio::test]
async fn get_by_field() {
    let instance = FakeInstance::new();
    instance.seed_incidents(5);
    let (client, log) = connect(&instance);

    let mut gr = client.glide_record("incident");
    assert!(gr.get_by("number", "INC0000003").await.unwrap());
    assert_eq!(gr.get_value("short_description").unwrap(), "incident 3");
    assert_eq!(
        log.exchanges()[0].param("sysparm_query"),
        Some("number=INC0000003^ORDERBYsys_id")
    );

    let mut missing = client.glide_record("incident");
    assert!(!missing.get_by("number", "INC9999999").await.unwrap());
}

#[tokio::test]
async fn get_uses_the_record_settings() {
    let instance = FakeInstance::new();
    let ids = instance.insert_rows(
        "incident",
        [json!({
            "number": "INC0000001",
            "caller_id": {"value": "6816f79cc0a8016401c5a33be04be441", "display_value": "Fred Luddy"},
        })],
    );
    let (client, log) = connect(&instance);

    let mut gr = client.glide_record("incident");
    gr.set_fields("number");
    assert!(gr.get(&ids[0]).await.unwrap());

    let exchange = &log.exchanges()[0];
    assert_eq!(exchange.param("sysparm_fields"), Some("sys_id,number"));
    assert_eq!(exchange.param("sysparm_offset"), None);
    assert!(!gr.contains("caller_id"));
    assert_eq!(gr.get_row_count(), 1);
}

#[tokio::test]
async fn authentication_failure() {
    let instance = FakeInstance::new();
    instance.seed_incidents(1);
    instance.deny_all();
    let (client, _log) = connect(&instance);

    let mut gr = client.glide_record("incident");
    let err = gr.query().await.unwrap_err();
    assert!(err.is_authentication());
    assert_eq!(err.to_string(), "authentication failed: User Not Authenticated");

    gr.initialize();
    assert!(gr.insert().await.unwrap_err().is_authentication());
}

#[tokio::test]
async fn cancelled_transaction_suggests_smaller_batches() {
    let instance = FakeInstance::new();
    instance.seed_incidents(1);
    instance.cancel_queries();
    let (client, _log) = connect(&instance);

    let mut gr = client.glide_record_with("incident", 500, true);
    let err = gr.query().await.unwrap_err();
    assert!(err.is_request());
    assert_eq!(
        err.to_string(),
        "request failed: Maximum execution time exceeded. Lower batch size (< 500)."
    );
}
