//! Request router: maps (method, resource, optional child kind/action) to an engine call.

use crate::config::{ResolvedResource, Role};
use crate::error::AppError;
use crate::extractors::RequestContext;
use crate::response::{success_many, success_message, success_one, success_one_ok, success_one_with_meta};
use crate::service::{parse_id, CascadeDeleter, Repository, RequestValidator};
use crate::sql::ListFilter;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

pub const CHANGE_PASSWORD: &str = "change_password";

/// What a request addresses within a resource family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Parent,
    Child,
    ChangePassword,
}

fn target_of(resource: &ResolvedResource, params: &HashMap<String, String>) -> Result<Target, AppError> {
    let selector = params
        .get("resource")
        .or_else(|| params.get("action"))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());
    match selector {
        None => Ok(Target::Parent),
        Some(s) if s == resource.name => Ok(Target::Parent),
        Some(s) if Some(s) == resource.child_kind() => Ok(Target::Child),
        Some(CHANGE_PASSWORD) if resource.password_field().is_some() => Ok(Target::ChangePassword),
        Some(_) => Err(AppError::BadRequest("Invalid resource".into())),
    }
}

/// Empty body is an empty object; anything else must be a JSON object.
fn body_object(body: &Bytes) -> Result<Map<String, Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(m)) => Ok(m),
        Ok(_) => Err(AppError::BadRequest("Request body must be a JSON object".into())),
        Err(_) => Err(AppError::BadRequest("Invalid JSON body".into())),
    }
}

fn query_id(params: &HashMap<String, String>, key: &str) -> Result<Option<i64>, AppError> {
    match params.get(key).map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("Invalid {}", key))),
    }
}

/// Delete target: `?id=` wins over a body `id`.
fn delete_id(params: &HashMap<String, String>, body: &Bytes) -> Result<i64, AppError> {
    if let Some(id) = query_id(params, "id")? {
        return Ok(id);
    }
    body_object(body)?
        .get("id")
        .and_then(parse_id)
        .ok_or_else(|| AppError::Validation("id is required".into()))
}

fn list_filter(params: &HashMap<String, String>) -> ListFilter {
    ListFilter {
        search: params.get("search").cloned(),
        sort: params.get("sort").cloned(),
        order: params.get("order").cloned(),
    }
}

/// Single entry point for `/api/:resource`. Authorization is settled before any body is read.
pub async fn dispatch(
    State(state): State<AppState>,
    ctx: RequestContext,
    method: Method,
    Path(name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Response, AppError> {
    if method == Method::OPTIONS {
        return Ok(StatusCode::OK.into_response());
    }
    let resource = state
        .registry
        .get(&name)
        .ok_or_else(|| AppError::BadRequest("Invalid resource".into()))?;
    let target = target_of(resource, &params)?;
    tracing::debug!(resource = %resource.name, method = %method, target = ?target, subject = ?ctx.subject(), "dispatch");

    match target {
        Target::Parent => parent(&state, &ctx, resource, method, &params, &body).await,
        Target::Child => child(&state, &ctx, resource, method, &params, &body).await,
        Target::ChangePassword => change_password(&state, &ctx, resource, method, &body).await,
    }
}

async fn parent(
    state: &AppState,
    ctx: &RequestContext,
    resource: &ResolvedResource,
    method: Method,
    params: &HashMap<String, String>,
    body: &Bytes,
) -> Result<Response, AppError> {
    let pool = &state.pool;
    match method {
        Method::GET => match query_id(params, "id")? {
            Some(id) => Ok(success_one_ok(Repository::get_by_id(pool, resource, id).await?).into_response()),
            None => {
                let rows = Repository::list(pool, resource, &list_filter(params)).await?;
                Ok(success_many(rows).into_response())
            }
        },
        Method::POST => {
            ctx.require(resource.write_role)?;
            let fields = RequestValidator::validate_create(resource, &body_object(body)?)?;
            RequestValidator::check_unique(pool, resource, &fields, None).await?;
            let record = Repository::create(pool, resource, &fields).await?;
            Ok(success_one(record).into_response())
        }
        Method::PUT => {
            ctx.require(resource.write_role)?;
            let obj = body_object(body)?;
            let id = obj
                .get("id")
                .and_then(parse_id)
                .ok_or_else(|| AppError::Validation("id is required".into()))?;
            // A missing target is reported before any body or uniqueness problem.
            Repository::ensure_exists(pool, resource, id).await?;
            let fields = RequestValidator::validate_update(resource, &obj)?;
            RequestValidator::check_unique(pool, resource, &fields, Some(id)).await?;
            let outcome = Repository::update(pool, resource, id, &fields).await?;
            Ok(success_one_with_meta(outcome.record, json!({ "changed": outcome.changed })).into_response())
        }
        Method::DELETE => {
            ctx.require(resource.write_role)?;
            let id = delete_id(params, body)?;
            CascadeDeleter::delete_parent(pool, resource, id).await?;
            Ok(success_message("Record deleted successfully").into_response())
        }
        _ => Err(AppError::MethodNotAllowed("Method not allowed".into())),
    }
}

async fn child(
    state: &AppState,
    ctx: &RequestContext,
    resource: &ResolvedResource,
    method: Method,
    params: &HashMap<String, String>,
    body: &Bytes,
) -> Result<Response, AppError> {
    let pool = &state.pool;
    match method {
        Method::GET => {
            if let Some(id) = query_id(params, "id")? {
                return Ok(success_one_ok(Repository::get_child(pool, resource, id).await?).into_response());
            }
            let parent_id = query_id(params, "parent_id")?
                .ok_or_else(|| AppError::Validation("parent_id is required".into()))?;
            let rows = Repository::get_children(pool, resource, parent_id).await?;
            Ok(success_many(rows).into_response())
        }
        Method::POST => {
            ctx.require(Role::User)?;
            let new = RequestValidator::validate_child(&body_object(body)?)?;
            let record = Repository::create_child(pool, resource, &new).await?;
            Ok(success_one(record).into_response())
        }
        Method::DELETE => {
            ctx.require(Role::User)?;
            let id = delete_id(params, body)?;
            Repository::delete_child(pool, resource, id).await?;
            Ok(success_message("Record deleted successfully").into_response())
        }
        _ => Err(AppError::MethodNotAllowed("Method not allowed".into())),
    }
}

async fn change_password(
    state: &AppState,
    ctx: &RequestContext,
    resource: &ResolvedResource,
    method: Method,
    body: &Bytes,
) -> Result<Response, AppError> {
    if method != Method::POST {
        return Err(AppError::MethodNotAllowed("Method not allowed".into()));
    }
    ctx.require(Role::User)?;
    let obj = body_object(body)?;
    let (lookup, key) = resource
        .unique_fields()
        .find_map(|f| obj.get(&f.name).filter(|v| !v.is_null()).map(|v| (f.name.as_str(), v)))
        .ok_or_else(|| AppError::Validation("An identifying field is required".into()))?;
    let current = obj.get("current_password").and_then(Value::as_str).unwrap_or("");
    let new = obj.get("new_password").and_then(Value::as_str).unwrap_or("");
    if current.is_empty() || new.is_empty() {
        return Err(AppError::Validation(
            "current_password and new_password are required".into(),
        ));
    }
    Repository::change_password(&state.pool, resource, lookup, key, current, new).await?;
    Ok(success_message("Password updated successfully").into_response())
}
