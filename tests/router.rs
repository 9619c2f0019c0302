mod common;

use axum::http::{Method, StatusCode};
use common::setup;
use serde_json::json;

#[tokio::test]
async fn week_lifecycle_with_comment() {
    let app = setup().await;
    let token = Some(app.user.as_str());

    let (status, body) = app
        .send(
            Method::POST,
            "/api/weeks",
            token,
            Some(json!({"title": "Week 1", "start_date": "2024-01-08", "description": "Intro"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app.send(Method::GET, &format!("/api/weeks?id={id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Week 1");
    assert_eq!(body["data"]["start_date"], "2024-01-08");
    assert_eq!(body["data"]["description"], "Intro");
    assert!(body["data"]["created_at"].is_string());
    assert!(body["data"]["updated_at"].is_string());

    let (status, body) = app
        .send(
            Method::POST,
            "/api/weeks?resource=comments",
            token,
            Some(json!({"parent_id": id, "author": "A", "text": "hi"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let comment_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .send(Method::GET, &format!("/api/weeks?resource=comments&parent_id={id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 1);

    let (status, body) = app.send(Method::DELETE, &format!("/api/weeks?id={id}"), token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = app.send(Method::GET, &format!("/api/weeks?id={id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = app
        .send(Method::GET, &format!("/api/weeks?resource=comments&id={comment_id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_link_is_rejected_without_insert() {
    let app = setup().await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/resources",
            Some(app.user.as_str()),
            Some(json!({"title": "Book", "link": "not-a-url"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"success": false, "message": "link must be a valid URL"}));
    assert_eq!(app.count("resources").await, 0);
}

#[tokio::test]
async fn mutations_need_a_session_before_validation() {
    let app = setup().await;
    // Invalid body would be a 400, but the missing session wins.
    let (status, body) = app.send(Method::POST, "/api/topics", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = app.send(Method::DELETE, "/api/topics?id=1", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/students",
            Some(app.user.as_str()),
            Some(json!({"student_id": "S-1", "name": "Ada", "email": "ada@uni.example", "password": "longpassword"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.count("students").await, 0);
}

#[tokio::test]
async fn duplicate_student_is_a_conflict() {
    let app = setup().await;
    let student = json!({"student_id": "S-1", "name": "Ada", "email": "ada@uni.example", "password": "longpassword"});
    let (status, body) = app.send(Method::POST, "/api/students", Some(app.admin.as_str()), Some(student.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["data"].get("password").is_none());

    let (status, body) = app.send(Method::POST, "/api/students", Some(app.admin.as_str()), Some(student)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "student_id already exists");
    assert_eq!(app.count("students").await, 1);
}

#[tokio::test]
async fn update_paths() {
    let app = setup().await;
    let token = Some(app.user.as_str());
    let (_, body) = app
        .send(
            Method::POST,
            "/api/topics",
            token,
            Some(json!({"subject": "Old", "message": "m", "author": "A"})),
        )
        .await;
    let id = body["data"]["id"].as_i64().unwrap();
    let updated_at = body["data"]["updated_at"].clone();

    let (status, _) = app
        .send(Method::PUT, "/api/topics", token, Some(json!({"id": 999, "subject": "X"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(Method::PUT, "/api/topics", token, Some(json!({"id": id, "unknown": "X"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No fields provided to update");
    let (_, body) = app.send(Method::GET, &format!("/api/topics?id={id}"), None, None).await;
    assert_eq!(body["data"]["updated_at"], updated_at);

    let (status, body) = app
        .send(Method::PUT, "/api/topics", token, Some(json!({"id": id, "subject": "New"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["subject"], "New");
    assert_eq!(body["meta"]["changed"], true);

    let (status, _) = app.send(Method::PUT, "/api/topics", token, Some(json!({"subject": "New"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_of_absent_id_is_not_found_before_body_checks() {
    let app = setup().await;
    let admin = Some(app.admin.as_str());
    let (status, _) = app
        .send(
            Method::POST,
            "/api/students",
            admin,
            Some(json!({"student_id": "S-1", "name": "Ada", "email": "ada@uni.example", "password": "longpassword"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Would be a 409 against an existing row.
    let (status, body) = app
        .send(Method::PUT, "/api/students", admin, Some(json!({"id": 999, "email": "ada@uni.example"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"success": false, "message": "Record not found"}));

    // Would be a 400 "No fields provided to update" against an existing row.
    let (status, _) = app.send(Method::PUT, "/api/students", admin, Some(json!({"id": 999}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(Method::PUT, "/api/weeks", Some(app.user.as_str()), Some(json!({"id": 999, "start_date": "not-a-date"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.count("students").await, 1);
}

#[tokio::test]
async fn list_search_and_invalid_sort() {
    let app = setup().await;
    let token = Some(app.user.as_str());
    for (title, date) in [("Ownership in Rust", "2024-01-15"), ("Lifetimes", "2024-01-08"), ("rustdoc tips", "2024-01-22")] {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/weeks",
                token,
                Some(json!({"title": title, "start_date": date, "description": "d"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app.send(Method::GET, "/api/weeks?search=RUST", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 2);
    assert_eq!(body["data"][0]["title"], "Ownership in Rust");
    assert_eq!(body["data"][1]["title"], "rustdoc tips");

    let (status, body) = app
        .send(Method::GET, "/api/weeks?sort=id%3BDROP%20TABLE%20weeks&order=up", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Lifetimes", "Ownership in Rust", "rustdoc tips"]);
}

#[tokio::test]
async fn unknown_resource_method_and_options() {
    let app = setup().await;
    let (status, body) = app.send(Method::GET, "/api/grades", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid resource");

    let (status, _) = app.send(Method::GET, "/api/weeks?resource=replies", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send(Method::PATCH, "/api/weeks", Some(app.user.as_str()), None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = app
        .send(Method::PUT, "/api/weeks?resource=comments", Some(app.user.as_str()), Some(json!({"id": 1})))
        .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = app.send(Method::OPTIONS, "/api/weeks", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn child_for_missing_parent_is_not_found() {
    let app = setup().await;
    let (status, _) = app
        .send(
            Method::POST,
            "/api/topics?resource=replies",
            Some(app.user.as_str()),
            Some(json!({"parent_id": 42, "author": "A", "text": "t"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.count("replies").await, 0);

    let (status, body) = app.send(Method::GET, "/api/topics?resource=replies&parent_id=42", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn delete_id_may_come_from_body() {
    let app = setup().await;
    let (_, body) = app
        .send(
            Method::POST,
            "/api/assignments",
            Some(app.user.as_str()),
            Some(json!({"title": "HW", "description": "d", "due_date": "2024-06-01"})),
        )
        .await;
    let id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["files"], json!([]));

    let (status, _) = app
        .send(Method::DELETE, "/api/assignments", Some(app.user.as_str()), Some(json!({"id": id.to_string()})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.count("assignments").await, 0);
}

#[tokio::test]
async fn store_fault_surfaces_as_generic_500() {
    let app = setup().await;
    let (_, body) = app
        .send(
            Method::POST,
            "/api/resources",
            Some(app.user.as_str()),
            Some(json!({"title": "T", "link": "https://x.example"})),
        )
        .await;
    let id = body["data"]["id"].as_i64().unwrap();
    sqlx::query("CREATE TRIGGER no_delete BEFORE DELETE ON resources BEGIN SELECT RAISE(ABORT, 'disk on fire'); END")
        .execute(app.pool())
        .await
        .unwrap();

    let (status, body) = app
        .send(Method::DELETE, &format!("/api/resources?id={id}"), Some(app.user.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"success": false, "message": "Database error occurred"}));
    assert_eq!(app.count("resources").await, 1);
}

#[tokio::test]
async fn change_password_action() {
    let app = setup().await;
    app.send(
        Method::POST,
        "/api/students",
        Some(app.admin.as_str()),
        Some(json!({"student_id": "S-1", "name": "Ada", "email": "ada@uni.example", "password": "old-password"})),
    )
    .await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/students?action=change_password",
            Some(app.user.as_str()),
            Some(json!({"student_id": "S-1", "current_password": "nope-nope", "new_password": "new-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/students?action=change_password",
            Some(app.user.as_str()),
            Some(json!({"student_id": "S-1", "current_password": "old-password", "new_password": "new-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Password updated successfully");
}

#[tokio::test]
async fn health_and_ready() {
    let app = setup().await;
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.send(Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "ok");
    assert_eq!(body["resources"], 5);
}
