use serde_json::{json, Value};
use storage::{DocumentFields, Storage};

fn object(value: Value) -> DocumentFields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[tokio::test]
async fn profile_document_survives_reopen() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("profiles.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    {
        let storage = Storage::new(&database_url).await.expect("db");
        storage
            .set_doc(
                "users",
                "uid-7",
                &object(json!({ "firstName": "", "lastName": "", "location": "", "bio": "" })),
            )
            .await
            .expect("create");
        storage
            .update_doc("users", "uid-7", &object(json!({ "bio": "hello" })))
            .await
            .expect("update");
        storage.pool().close().await;
    }

    let reopened = Storage::new(&database_url).await.expect("reopen");
    let doc = reopened
        .get_doc("users", "uid-7")
        .await
        .expect("get")
        .expect("doc");
    assert_eq!(doc["bio"], json!("hello"));
    assert_eq!(doc["firstName"], json!(""));
}
