#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use course_portal::config::{ResolvedResource, Role};
use course_portal::service::{RequestValidator, ValidatedFields};
use course_portal::{app, apply_migrations, builtin_resources, connect_in_memory, resolve, AppState, InMemorySessionStore};
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::ServiceExt;

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub admin: String,
    pub user: String,
}

impl TestApp {
    pub fn pool(&self) -> &SqlitePool {
        &self.state.pool
    }

    pub fn resource(&self, name: &str) -> &ResolvedResource {
        self.state.registry.get(name).expect("builtin resource")
    }

    /// Send one request through the full router; returns status and parsed body (Null when empty).
    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = self.router.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{table}\""))
            .fetch_one(self.pool())
            .await
            .unwrap()
    }
}

pub async fn setup() -> TestApp {
    let pool = connect_in_memory().await.unwrap();
    let registry = resolve(&builtin_resources()).unwrap();
    apply_migrations(&pool, &registry).await.unwrap();
    let sessions = InMemorySessionStore::new();
    let admin = sessions.issue("admin", Role::Admin);
    let user = sessions.issue("student", Role::User);
    let state = AppState::new(pool, registry, Arc::new(sessions));
    let router = app(state.clone(), 1024 * 1024);
    TestApp {
        state,
        router,
        admin,
        user,
    }
}

pub fn object(v: Value) -> Map<String, Value> {
    v.as_object().cloned().expect("json object")
}

pub fn create_fields(resource: &ResolvedResource, v: Value) -> ValidatedFields {
    RequestValidator::validate_create(resource, &object(v)).unwrap()
}
