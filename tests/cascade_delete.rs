mod common;

use common::{create_fields, setup, TestApp};
use course_portal::service::{CascadeState, NewChild};
use course_portal::{AppError, CascadeDeleter, Repository};
use serde_json::json;

async fn week_with_comments(app: &TestApp, title: &str, n: usize) -> i64 {
    let weeks = app.resource("weeks");
    let fields = create_fields(weeks, json!({"title": title, "start_date": "2024-01-08", "description": "d"}));
    let id = Repository::create(app.pool(), weeks, &fields).await.unwrap()["id"]
        .as_i64()
        .unwrap();
    for i in 0..n {
        let new = NewChild {
            parent_id: id,
            author: "A".into(),
            text: format!("comment {i}"),
        };
        Repository::create_child(app.pool(), weeks, &new).await.unwrap();
    }
    id
}

async fn comments_for(app: &TestApp, parent_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM week_comments WHERE parent_id = ?")
        .bind(parent_id)
        .fetch_one(app.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn removes_parent_and_every_child() {
    let app = setup().await;
    let weeks = app.resource("weeks");
    let doomed = week_with_comments(&app, "doomed", 4).await;
    let kept = week_with_comments(&app, "kept", 2).await;

    let outcome = CascadeDeleter::delete_parent(app.pool(), weeks, doomed).await.unwrap();
    assert_eq!(outcome.children_deleted, 4);
    assert_eq!(
        outcome.trace,
        vec![
            CascadeState::Begin,
            CascadeState::VerifyExists,
            CascadeState::DeleteChildren,
            CascadeState::DeleteParent,
            CascadeState::Commit,
            CascadeState::Committed,
        ]
    );
    assert_eq!(outcome.final_state(), CascadeState::Committed);

    assert_eq!(comments_for(&app, doomed).await, 0);
    assert!(matches!(
        Repository::get_by_id(app.pool(), weeks, doomed).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(comments_for(&app, kept).await, 2);
    Repository::get_by_id(app.pool(), weeks, kept).await.unwrap();
}

#[tokio::test]
async fn missing_parent_is_not_found_and_removes_nothing() {
    let app = setup().await;
    let weeks = app.resource("weeks");
    week_with_comments(&app, "w", 1).await;

    let failure = CascadeDeleter::delete_parent(app.pool(), weeks, 999).await.unwrap_err();
    assert!(matches!(failure.error, AppError::NotFound(_)));
    assert_eq!(failure.failed_at, CascadeState::VerifyExists);
    assert_eq!(
        failure.trace,
        vec![CascadeState::Begin, CascadeState::VerifyExists, CascadeState::RolledBack]
    );
    assert_eq!(app.count("weeks").await, 1);
    assert_eq!(app.count("week_comments").await, 1);
}

#[tokio::test]
async fn store_fault_mid_cascade_restores_pre_state() {
    let app = setup().await;
    let weeks = app.resource("weeks");
    let id = week_with_comments(&app, "fragile", 3).await;

    // Children are already gone inside the transaction when the parent delete aborts.
    sqlx::query(
        "CREATE TRIGGER fail_week_delete BEFORE DELETE ON weeks \
         BEGIN SELECT RAISE(ABORT, 'simulated fault'); END",
    )
    .execute(app.pool())
    .await
    .unwrap();

    let failure = CascadeDeleter::delete_parent(app.pool(), weeks, id).await.unwrap_err();
    assert_eq!(failure.failed_at, CascadeState::DeleteParent);
    assert_eq!(failure.final_state(), CascadeState::RolledBack);
    assert!(failure.trace.contains(&CascadeState::DeleteChildren));
    assert!(!failure.trace.contains(&CascadeState::Commit));

    let err = AppError::from(failure);
    assert!(matches!(err, AppError::Db(_)));
    assert_eq!(err.public_message(), "Database error occurred");

    assert_eq!(comments_for(&app, id).await, 3);
    Repository::get_by_id(app.pool(), weeks, id).await.unwrap();
}

#[tokio::test]
async fn childless_family_skips_child_step() {
    let app = setup().await;
    let students = app.resource("students");
    let fields = create_fields(
        students,
        json!({"student_id": "S-1", "name": "Ada", "email": "ada@uni.example", "password": "longpassword"}),
    );
    let id = Repository::create(app.pool(), students, &fields).await.unwrap()["id"]
        .as_i64()
        .unwrap();

    let outcome = CascadeDeleter::delete_parent(app.pool(), students, id).await.unwrap();
    assert!(!outcome.trace.contains(&CascadeState::DeleteChildren));
    assert_eq!(outcome.children_deleted, 0);
    assert_eq!(app.count("students").await, 0);
}
