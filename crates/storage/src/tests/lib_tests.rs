use super::*;
use serde_json::json;

fn fields(value: Value) -> DocumentFields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn missing_document_reads_as_none() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let doc = storage.get_doc("users", "nobody").await.expect("get");
    assert!(doc.is_none());
}

#[tokio::test]
async fn set_doc_replaces_whole_document() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .set_doc("users", "u1", &fields(json!({ "bio": "old", "location": "Oslo" })))
        .await
        .expect("first set");
    storage
        .set_doc("users", "u1", &fields(json!({ "bio": "new" })))
        .await
        .expect("second set");

    let doc = storage.get_doc("users", "u1").await.expect("get").expect("doc");
    assert_eq!(doc, fields(json!({ "bio": "new" })));
}

#[tokio::test]
async fn update_doc_merges_only_named_fields() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .set_doc(
            "users",
            "u1",
            &fields(json!({ "firstName": "", "lastName": "", "location": "", "bio": "" })),
        )
        .await
        .expect("set");
    storage
        .update_doc("users", "u1", &fields(json!({ "bio": "hello" })))
        .await
        .expect("update");

    let doc = storage.get_doc("users", "u1").await.expect("get").expect("doc");
    assert_eq!(doc["bio"], json!("hello"));
    assert_eq!(doc["location"], json!(""));
    assert_eq!(doc.len(), 4);
}

#[tokio::test]
async fn update_doc_fails_for_absent_document() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let err = storage
        .update_doc("users", "ghost", &fields(json!({ "bio": "x" })))
        .await
        .expect_err("update should fail");
    assert!(err.to_string().contains("does not exist"));
    assert!(storage.get_doc("users", "ghost").await.expect("get").is_none());
}

#[tokio::test]
async fn documents_are_scoped_by_collection() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .set_doc("users", "same", &fields(json!({ "bio": "user" })))
        .await
        .expect("set");
    assert!(storage.get_doc("other", "same").await.expect("get").is_none());
}

#[tokio::test]
async fn account_profile_update_keeps_unset_attributes() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let uid = SessionId::from("acct-1");
    storage
        .insert_account(&NewAccount {
            uid: uid.clone(),
            email: Some("ada@example.com".into()),
            password_digest: Some("digest".into()),
            password_salt: Some("salt".into()),
            is_anonymous: false,
        })
        .await
        .expect("insert");

    storage
        .update_account_profile(&uid, Some("Ada Lovelace"), None)
        .await
        .expect("name");
    let account = storage
        .update_account_profile(&uid, None, Some("file:///me.png"))
        .await
        .expect("photo");

    assert_eq!(account.display_name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(account.photo_ref.as_deref(), Some("file:///me.png"));
}

#[tokio::test]
async fn account_lookup_by_email_ignores_case() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .insert_account(&NewAccount {
            uid: SessionId::from("acct-2"),
            email: Some("grace@example.com".into()),
            password_digest: None,
            password_salt: None,
            is_anonymous: false,
        })
        .await
        .expect("insert");

    let found = storage
        .account_by_email("Grace@Example.com")
        .await
        .expect("lookup")
        .expect("account");
    assert_eq!(found.uid, SessionId::from("acct-2"));
}

#[tokio::test]
async fn updating_unknown_account_fails() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let err = storage
        .update_account_profile(&SessionId::from("missing"), Some("x"), None)
        .await
        .expect_err("should fail");
    assert!(err.to_string().contains("does not exist"));
}

#[tokio::test]
async fn current_session_slot_holds_one_session() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert!(storage.load_current_session().await.expect("load").is_none());

    storage
        .save_current_session(&SessionId::from("u1"), None)
        .await
        .expect("save");
    storage
        .save_current_session(&SessionId::from("u2"), Some("refresh-2"))
        .await
        .expect("overwrite");
    let saved = storage
        .load_current_session()
        .await
        .expect("load")
        .expect("saved");
    assert_eq!(saved.uid, SessionId::from("u2"));
    assert_eq!(saved.refresh_token.as_deref(), Some("refresh-2"));

    storage.clear_current_session().await.expect("clear");
    assert!(storage.load_current_session().await.expect("load").is_none());
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db").expect("url"),
        "sqlite://./data/test.db"
    );
    assert_eq!(
        normalize_database_url("sqlite::memory:").expect("url"),
        "sqlite::memory:"
    );
    assert!(normalize_database_url("  ").is_err());
}

#[test]
fn prepare_database_url_creates_parent_dir() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("data").join("app.db");

    prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare db url");
    assert!(temp_root.path().join("data").exists());
}
