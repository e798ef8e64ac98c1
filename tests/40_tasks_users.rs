mod common;

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn tasks_are_writable_by_any_authenticated_caller() {
    let app = common::TestApp::new().await;
    let user = app.user_token();

    let created = app
        .post("/tasks", Some(&user), json!({"title": "Write tests", "description": "all of them"}))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["completed"], false);

    let updated = app.put("/tasks/1", Some(&user), json!({"completed": true})).await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["completed"], true);
    assert_eq!(updated.body["description"], "all of them");

    assert_eq!(app.delete("/tasks/1", Some(&user)).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get("/tasks", None).await.body, json!([]));
}

#[tokio::test]
async fn task_title_is_required() {
    let app = common::TestApp::new().await;

    let reply = app
        .post("/tasks", Some(&app.user_token()), json!({"completed": true}))
        .await;
    common::assert_error(&reply, StatusCode::BAD_REQUEST, "VALIDATION_ERROR");
    assert_eq!(reply.body["error"], "Title is required");
}

#[tokio::test]
async fn users_require_authentication_to_read() {
    let app = common::TestApp::new().await;

    common::assert_error(&app.get("/users", None).await, StatusCode::UNAUTHORIZED, "UNAUTHORIZED");
    common::assert_error(&app.get("/users/1", None).await, StatusCode::UNAUTHORIZED, "UNAUTHORIZED");

    let reply = app.get("/users", Some(&app.user_token())).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!([]));
}

#[tokio::test]
async fn user_emails_are_unique() {
    let app = common::TestApp::new().await;
    let admin = app.admin_token();

    let ada = app
        .post("/users", Some(&admin), json!({"name": "Ada", "email": "ada@example.com", "age": 36}))
        .await;
    assert_eq!(ada.status, StatusCode::CREATED, "body: {}", ada.body);

    let dup = app
        .post("/users", Some(&admin), json!({"name": "Other Ada", "email": "ADA@example.com"}))
        .await;
    common::assert_error(&dup, StatusCode::CONFLICT, "CONFLICT");

    let grace = app
        .post("/users", Some(&admin), json!({"name": "Grace", "email": "grace@example.com"}))
        .await;
    assert_eq!(grace.body["id"], 2);

    let clash = app
        .put("/users/2", Some(&admin), json!({"email": "ada@example.com"}))
        .await;
    common::assert_error(&clash, StatusCode::CONFLICT, "CONFLICT");

    // keeping your own address is not a conflict
    let same = app
        .put("/users/1", Some(&admin), json!({"email": "ada@example.com", "age": 37}))
        .await;
    assert_eq!(same.status, StatusCode::OK);
    assert_eq!(same.body["age"], 37);
}

#[tokio::test]
async fn user_fields_are_validated() {
    let app = common::TestApp::new().await;
    let admin = app.admin_token();

    let reply = app.post("/users", Some(&admin), json!({})).await;
    common::assert_error(&reply, StatusCode::BAD_REQUEST, "VALIDATION_ERROR");
    assert!(reply.body["details"]["name"].is_string());
    assert!(reply.body["details"]["email"].is_string());

    let reply = app
        .post("/users", Some(&admin), json!({"name": "Ada", "email": "not-an-email"}))
        .await;
    common::assert_error(&reply, StatusCode::BAD_REQUEST, "VALIDATION_ERROR");
    assert_eq!(reply.body["details"]["email"], "Email must be a valid email address");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_get_distinct_ids() {
    let app = Arc::new(common::TestApp::new().await);
    let token = app.user_token();

    let handles: Vec<_> = (0..25)
        .map(|i| {
            let app = app.clone();
            let token = token.clone();
            tokio::spawn(async move {
                app.post("/tasks", Some(&token), json!({ "title": format!("task {}", i) }))
                    .await
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        let reply = handle.await.expect("task panicked");
        assert_eq!(reply.status, StatusCode::CREATED);
        ids.insert(reply.body["id"].as_u64().expect("numeric id"));
    }

    assert_eq!(ids, (1..=25).collect::<HashSet<u64>>());
    assert_eq!(app.get("/tasks", None).await.body.as_array().map(Vec::len), Some(25));
}
