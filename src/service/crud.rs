//! Repository: list/get/create/update and child operations against SQLite.

use crate::config::{FieldKind, ResolvedChild, ResolvedResource};
use crate::error::AppError;
use crate::service::password::{hash_password, verify_password};
use crate::service::validation::{NewChild, ValidatedFields};
use crate::sql::{self, bind_all, ListFilter, QueryBuf};
use serde_json::Value;
use sqlx::sqlite::{Sqlite, SqliteQueryResult, SqliteRow};
use sqlx::{Executor, SqlitePool};

/// Result of a partial update: the row as stored afterwards and whether any value differs.
#[derive(Debug)]
pub struct UpdateOutcome {
    pub record: Value,
    pub changed: bool,
}

pub struct Repository;

impl Repository {
    /// Filtered, ordered parent rows. Secret columns are never selected.
    pub async fn list(
        pool: &SqlitePool,
        resource: &ResolvedResource,
        filter: &ListFilter,
    ) -> Result<Vec<Value>, AppError> {
        let q = sql::select_list(resource, filter);
        let rows = fetch_all(pool, &q).await?;
        Ok(rows.iter().map(|r| row_to_json(resource, r)).collect())
    }

    pub async fn get_by_id(
        pool: &SqlitePool,
        resource: &ResolvedResource,
        id: i64,
    ) -> Result<Value, AppError> {
        let q = sql::select_by_id(resource, id);
        fetch_optional(pool, &q)
            .await?
            .map(|r| row_to_json(resource, &r))
            .ok_or_else(|| AppError::NotFound("Record not found".into()))
    }

    pub async fn ensure_exists(
        pool: &SqlitePool,
        resource: &ResolvedResource,
        id: i64,
    ) -> Result<(), AppError> {
        match fetch_optional(pool, &sql::exists_by_id(resource, id)).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound("Record not found".into())),
        }
    }

    /// Insert validated fields (hashing any credential) and return the stored row.
    pub async fn create(
        pool: &SqlitePool,
        resource: &ResolvedResource,
        fields: &ValidatedFields,
    ) -> Result<Value, AppError> {
        let mut values = fields.as_slice().to_vec();
        if let Some(secret) = resource.password_field() {
            for (_, value) in values.iter_mut().filter(|(n, _)| *n == secret.name) {
                let hashed = match value {
                    Value::String(plain) => hash_password(plain)?,
                    _ => continue,
                };
                *value = Value::String(hashed);
            }
        }
        let q = sql::insert(resource, &values, &now());
        let done = execute(pool, &q).await.map_err(unique_violation_to_conflict)?;
        let id = done.last_insert_rowid();
        tracing::info!(resource = %resource.name, id, "created");
        Self::get_by_id(pool, resource, id).await
    }

    /// Write the supplied fields plus `updated_at`. `NotFound` leaves the store untouched.
    pub async fn update(
        pool: &SqlitePool,
        resource: &ResolvedResource,
        id: i64,
        fields: &ValidatedFields,
    ) -> Result<UpdateOutcome, AppError> {
        let current = Self::get_by_id(pool, resource, id).await?;
        let q = sql::update(resource, id, fields.as_slice(), &now())
            .ok_or_else(|| AppError::Validation("No fields provided to update".into()))?;
        let changed = fields
            .as_slice()
            .iter()
            .any(|(name, value)| current.get(name) != Some(value));
        execute(pool, &q).await.map_err(unique_violation_to_conflict)?;
        tracing::info!(resource = %resource.name, id, changed, "updated");
        let record = Self::get_by_id(pool, resource, id).await?;
        Ok(UpdateOutcome { record, changed })
    }

    /// Id of another row holding `value` in `field`, if any.
    pub async fn find_duplicate(
        pool: &SqlitePool,
        resource: &ResolvedResource,
        field: &str,
        value: &Value,
        exclude_id: Option<i64>,
    ) -> Result<Option<i64>, AppError> {
        let Some(q) = sql::select_duplicate(resource, field, value, exclude_id) else {
            return Ok(None);
        };
        let row = fetch_optional(pool, &q).await?;
        Ok(row.map(|r| sqlx::Row::try_get::<i64, _>(&r, 0)).transpose()?)
    }

    /// Children of `parent_id`, oldest first. A missing parent yields an empty list.
    pub async fn get_children(
        pool: &SqlitePool,
        resource: &ResolvedResource,
        parent_id: i64,
    ) -> Result<Vec<Value>, AppError> {
        let child = child_of(resource)?;
        let rows = fetch_all(pool, &sql::select_children(child, parent_id)).await?;
        Ok(rows.iter().map(child_to_json).collect())
    }

    pub async fn get_child(
        pool: &SqlitePool,
        resource: &ResolvedResource,
        id: i64,
    ) -> Result<Value, AppError> {
        let child = child_of(resource)?;
        fetch_optional(pool, &sql::select_child_by_id(child, id))
            .await?
            .map(|r| child_to_json(&r))
            .ok_or_else(|| AppError::NotFound("Record not found".into()))
    }

    /// Parent existence is checked in the same transaction as the insert.
    pub async fn create_child(
        pool: &SqlitePool,
        resource: &ResolvedResource,
        new: &NewChild,
    ) -> Result<Value, AppError> {
        let child = child_of(resource)?;
        let mut tx = pool.begin().await?;
        if fetch_optional(&mut *tx, &sql::exists_by_id(resource, new.parent_id))
            .await?
            .is_none()
        {
            tx.rollback().await?;
            return Err(AppError::NotFound("Parent record not found".into()));
        }
        let q = sql::insert_child(child, new.parent_id, &new.author, &new.text, &now());
        let id = execute(&mut *tx, &q).await?.last_insert_rowid();
        let row = fetch_optional(&mut *tx, &sql::select_child_by_id(child, id))
            .await?
            .ok_or_else(|| AppError::Internal("inserted child vanished".into()))?;
        tx.commit().await?;
        tracing::info!(resource = %resource.name, kind = %child.kind, id, parent_id = new.parent_id, "child created");
        Ok(child_to_json(&row))
    }

    pub async fn delete_child(
        pool: &SqlitePool,
        resource: &ResolvedResource,
        id: i64,
    ) -> Result<(), AppError> {
        let child = child_of(resource)?;
        let done = execute(pool, &sql::delete_child(child, id)).await?;
        if done.rows_affected() == 0 {
            return Err(AppError::NotFound("Record not found".into()));
        }
        tracing::info!(resource = %resource.name, kind = %child.kind, id, "child deleted");
        Ok(())
    }

    /// Replace a stored credential after verifying the current one.
    pub async fn change_password(
        pool: &SqlitePool,
        resource: &ResolvedResource,
        lookup_field: &str,
        key: &Value,
        current: &str,
        new: &str,
    ) -> Result<(), AppError> {
        let secret = resource
            .password_field()
            .ok_or_else(|| AppError::BadRequest("Resource has no password field".into()))?;
        if let Some(min) = secret.min_length {
            if (new.chars().count() as u32) < min {
                return Err(AppError::Validation(format!(
                    "new_password must be at least {} characters",
                    min
                )));
            }
        }
        let q = sql::select_secret(resource, lookup_field, key)
            .ok_or_else(|| AppError::BadRequest(format!("{} is not a lookup field", lookup_field)))?;
        let row = fetch_optional(pool, &q)
            .await?
            .ok_or_else(|| AppError::NotFound("Record not found".into()))?;
        let id: i64 = sqlx::Row::try_get(&row, 0)?;
        let stored: String = sqlx::Row::try_get(&row, 1)?;
        if !verify_password(current, &stored)? {
            return Err(AppError::Unauthorized("Current password is incorrect".into()));
        }
        let hash = hash_password(new)?;
        let q = sql::update_secret(resource, id, &hash, &now())
            .ok_or_else(|| AppError::Internal("password field disappeared".into()))?;
        execute(pool, &q).await?;
        tracing::info!(resource = %resource.name, id, "password changed");
        Ok(())
    }
}

fn child_of(resource: &ResolvedResource) -> Result<&ResolvedChild, AppError> {
    resource
        .child
        .as_ref()
        .ok_or_else(|| AppError::BadRequest(format!("{} has no child records", resource.name)))
}

fn unique_violation_to_conflict(e: AppError) -> AppError {
    match e {
        AppError::Db(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            AppError::Conflict("Record already exists".into())
        }
        other => other,
    }
}

/// RFC 3339 UTC with milliseconds; sorts lexicographically.
pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub(crate) async fn fetch_all<'c, E>(exec: E, q: &QueryBuf) -> Result<Vec<SqliteRow>, AppError>
where
    E: Executor<'c, Database = Sqlite>,
{
    tracing::debug!(sql = %q.sql, params = ?q.redacted(), "query");
    Ok(bind_all(sqlx::query(&q.sql), &q.params).fetch_all(exec).await?)
}

pub(crate) async fn fetch_optional<'c, E>(exec: E, q: &QueryBuf) -> Result<Option<SqliteRow>, AppError>
where
    E: Executor<'c, Database = Sqlite>,
{
    tracing::debug!(sql = %q.sql, params = ?q.redacted(), "query");
    Ok(bind_all(sqlx::query(&q.sql), &q.params)
        .fetch_optional(exec)
        .await?)
}

pub(crate) async fn execute<'c, E>(exec: E, q: &QueryBuf) -> Result<SqliteQueryResult, AppError>
where
    E: Executor<'c, Database = Sqlite>,
{
    tracing::debug!(sql = %q.sql, params = ?q.redacted(), "execute");
    Ok(bind_all(sqlx::query(&q.sql), &q.params).execute(exec).await?)
}

fn row_to_json(resource: &ResolvedResource, row: &SqliteRow) -> Value {
    let mut obj = cells_to_map(row);
    for field in resource.fields.iter().filter(|f| f.kind == FieldKind::List) {
        let Some(v) = obj.get_mut(&field.name) else { continue };
        let decoded = match v {
            Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| Value::Array(vec![])),
            _ => continue,
        };
        *v = decoded;
    }
    Value::Object(obj)
}

fn child_to_json(row: &SqliteRow) -> Value {
    Value::Object(cells_to_map(row))
}

fn cells_to_map(row: &SqliteRow) -> serde_json::Map<String, Value> {
    use sqlx::{Column, Row};
    let mut map = serde_json::Map::new();
    for (i, col) in row.columns().iter().enumerate() {
        map.insert(col.name().to_string(), cell_to_value(row, i));
    }
    map
}

fn cell_to_value(row: &SqliteRow, idx: usize) -> Value {
    use sqlx::{Row, TypeInfo, ValueRef};
    let Ok(raw) = row.try_get_raw(idx) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }
    let type_name = raw.type_info().name().to_string();
    match type_name.as_str() {
        "INTEGER" => row
            .try_get::<i64, _>(idx)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "REAL" => row
            .try_get::<f64, _>(idx)
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<String, _>(idx)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}
