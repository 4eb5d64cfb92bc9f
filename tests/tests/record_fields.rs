use pretty_assertions::assert_eq;
use serde_json::json;
use snc::{DisplayValue, SerializeOptions};
use tests::{connect, FakeInstance, INSTANCE};

fn seed_with_caller(instance: &FakeInstance) -> String {
    instance.insert_rows(
        "incident",
        [json!({
            "number": "INC0000001",
            "active": "true",
            "opened_at": "2008-11-03 16:36:03",
            "caller_id": {
                "value": "6816f79cc0a8016401c5a33be04be441",
                "display_value": "Fred Luddy",
                "link": format!("{INSTANCE}/api/now/table/sys_user/6816f79cc0a8016401c5a33be04be441"),
            },
            "caller_id.email": "fred.luddy@example.com",
        })],
    )[0]
    .clone()
}

#[tokio::test]
async fn value_and_display_value() {
    let instance = FakeInstance::new();
    seed_with_caller(&instance);
    let (client, _log) = connect(&instance);

    let mut gr = client.glide_record("incident");
    gr.query().await.unwrap();
    assert!(gr.next().await.unwrap());

    assert_eq!(gr.get_value("caller_id").unwrap(), "6816f79cc0a8016401c5a33be04be441");
    assert_eq!(gr.get_display_value("caller_id").unwrap(), "Fred Luddy");
    // Display falls back to the value when they are the same.
    assert_eq!(gr.get_display_value("number").unwrap(), "INC0000001");
    assert!(gr.get_value("no_such_field").unwrap().is_null());

    let caller = gr.element("caller_id").unwrap().unwrap();
    assert_eq!(caller.link(), None);
    assert!(gr.element("active").unwrap().unwrap().as_bool());
    assert_eq!(
        gr.element("opened_at").unwrap().unwrap().date_numeric_value().unwrap(),
        1_225_730_163_000
    );
}

#[tokio::test]
async fn dot_walked_fields() {
    let instance = FakeInstance::new();
    seed_with_caller(&instance);
    let (client, _log) = connect(&instance);

    let mut gr = client.glide_record("incident");
    gr.query().await.unwrap();
    assert!(gr.next().await.unwrap());

    let email = gr.element("caller_id.email").unwrap().unwrap();
    assert_eq!(email.get_value(), "fred.luddy@example.com");
    assert!(gr.element("caller_id.name").unwrap().is_none());
}

#[tokio::test]
async fn display_value_modes() {
    let instance = FakeInstance::new();
    seed_with_caller(&instance);
    let (client, log) = connect(&instance);

    let mut gr = client.glide_record("incident");
    gr.set_display_value_mode(DisplayValue::Display);
    gr.query().await.unwrap();
    assert!(gr.next().await.unwrap());
    assert_eq!(log.exchanges()[0].param("sysparm_display_value"), Some("true"));
    assert_eq!(gr.get_value("caller_id").unwrap(), "Fred Luddy");

    let mut gr = client.glide_record("incident");
    gr.set_display_value_mode(DisplayValue::Value);
    gr.query().await.unwrap();
    assert!(gr.next().await.unwrap());
    assert_eq!(gr.get_value("caller_id").unwrap(), "6816f79cc0a8016401c5a33be04be441");
    assert_eq!(gr.get_display_value("caller_id").unwrap(), "6816f79cc0a8016401c5a33be04be441");
}

#[tokio::test]
async fn reference_links_when_requested() {
    let instance = FakeInstance::new();
    seed_with_caller(&instance);
    let (client, log) = connect(&instance);

    let mut gr = client.glide_record("incident");
    gr.set_exclude_reference_link(false);
    gr.set_fields(["number", "caller_id"]);
    gr.query().await.unwrap();
    assert!(gr.next().await.unwrap());
    assert_eq!(
        log.exchanges()[0].param("sysparm_exclude_reference_link"),
        Some("false")
    );

    let link = format!("{INSTANCE}/api/now/table/sys_user/6816f79cc0a8016401c5a33be04be441");
    assert_eq!(
        gr.element("caller_id").unwrap().unwrap().link(),
        Some(link.as_str())
    );

    let linked = gr
        .serialize(&SerializeOptions::default().exclude_reference_link(false))
        .unwrap();
    assert_eq!(
        serde_json::Value::Object(linked),
        json!({
            "sys_id": gr.sys_id().unwrap(),
            "number": "INC0000001",
            "caller_id": {"value": "6816f79cc0a8016401c5a33be04be441", "link": link},
        })
    );
}

#[tokio::test]
async fn serialize_modes() {
    let instance = FakeInstance::new();
    let sys_id = seed_with_caller(&instance);
    let (client, _log) = connect(&instance);

    let mut gr = client.glide_record("incident");
    gr.set_fields("number,caller_id");
    assert!(gr.get(&sys_id).await.unwrap());

    let plain = gr.serialize(&SerializeOptions::default()).unwrap();
    assert_eq!(
        serde_json::Value::Object(plain),
        json!({
            "sys_id": sys_id,
            "number": "INC0000001",
            "caller_id": "6816f79cc0a8016401c5a33be04be441",
        })
    );

    let display = gr
        .serialize(
            &SerializeOptions::default()
                .display_value(DisplayValue::Display)
                .fields(["caller_id"]),
        )
        .unwrap();
    assert_eq!(serde_json::Value::Object(display), json!({"caller_id": "Fred Luddy"}));

    let both = gr
        .serialize(
            &SerializeOptions::default()
                .display_value(DisplayValue::Both)
                .fields(["caller_id"]),
        )
        .unwrap();
    assert_eq!(
        serde_json::Value::Object(both),
        json!({"caller_id": {"value": "6816f79cc0a8016401c5a33be04be441", "display_value": "Fred Luddy"}})
    );

    gr.set_value("number", "INC0000002").unwrap();
    let changes = gr.serialize(&SerializeOptions::changes_only()).unwrap();
    assert_eq!(serde_json::Value::Object(changes), json!({"number": "INC0000002"}));

    assert_eq!(
        gr.to_string(),
        format!(r#"incident({{"number":"INC0000002","caller_id":"6816f79cc0a8016401c5a33be04be441","sys_id":"{sys_id}"}})"#)
    );
}

#[tokio::test]
async fn serialize_all_rows() {
    let instance = FakeInstance::new();
    instance.seed_incidents(3);
    let (client, _log) = connect(&instance);

    let mut gr = client.glide_record_with("incident", 2, true);
    gr.set_fields(["number"]);
    gr.query().await.unwrap();

    let rows = gr
        .serialize_all(&SerializeOptions::default().fields(["number"]))
        .await
        .unwrap();
    let rows: Vec<_> = rows.into_iter().map(serde_json::Value::Object).collect();
    assert_eq!(
        rows,
        vec![
            json!({"number": "INC0000000"}),
            json!({"number": "INC0000001"}),
            json!({"number": "INC0000002"}),
        ]
    );
}

#[tokio::test]
async fn new_cells_on_an_existing_row_count_as_changes() {
    let instance = FakeInstance::new();
    let ids = instance.seed_incidents(1);
    let (client, _log) = connect(&instance);

    let mut gr = client.glide_record("incident");
    gr.set_fields("number");
    assert!(gr.get(&ids[0]).await.unwrap());
    assert!(!gr.changes());

    gr.set_value("work_notes", "called the user").unwrap();
    assert!(gr.changes());

    gr.update().await.unwrap();
    assert_eq!(instance.row("incident", &ids[0]).unwrap()["work_notes"], "called the user");
}

#[tokio::test]
async fn fields_fall_back_to_the_row() {
    let instance = FakeInstance::new();
    instance.seed_incidents(1);
    let (client, _log) = connect(&instance);

    let mut gr = client.glide_record("incident");
    assert!(gr.fields().is_empty());

    gr.query().await.unwrap();
    assert_eq!(
        gr.fields(),
        vec!["number", "short_description", "priority", "active", "sys_id"]
    );

    gr.set_fields("number");
    assert_eq!(gr.fields(), vec!["number"]);
}
