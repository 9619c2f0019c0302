//! Field validation and sanitization driven by resource descriptors.

use crate::config::{FieldKind, FieldSpec, ResolvedResource};
use crate::error::AppError;
use crate::service::Repository;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use sqlx::SqlitePool;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://[^\s/$.?#][^\s]*$").expect("url regex"));
static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date regex"));

/// Whitelisted, normalized field values ready for the repository, in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidatedFields(Vec<(String, Value)>);

impl ValidatedFields {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn as_slice(&self) -> &[(String, Value)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn push(&mut self, name: &str, value: Value) {
        self.0.push((name.to_string(), value));
    }
}

/// A validated comment or reply.
#[derive(Clone, Debug, PartialEq)]
pub struct NewChild {
    pub parent_id: i64,
    pub author: String,
    pub text: String,
}

/// Strip markup then trim.
pub fn sanitize(s: &str) -> String {
    TAG_RE.replace_all(s, "").trim().to_string()
}

/// Ids arrive as JSON numbers or numeric strings.
pub fn parse_id(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub struct RequestValidator;

impl RequestValidator {
    /// Every required field must be present and non-blank. All missing names are reported at once.
    pub fn validate_create(
        resource: &ResolvedResource,
        body: &Map<String, Value>,
    ) -> Result<ValidatedFields, AppError> {
        let mut out = ValidatedFields::default();
        let mut missing = Vec::new();
        for field in &resource.fields {
            match normalize(field, body.get(&field.name))? {
                Some(v) => out.push(&field.name, v),
                None if field.required => missing.push(field.name.as_str()),
                None if field.kind == FieldKind::List => out.push(&field.name, Value::Array(vec![])),
                None => {}
            }
        }
        if !missing.is_empty() {
            return Err(AppError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }
        Ok(out)
    }

    /// Any non-empty subset of updatable fields. Unknown keys (including `id`) are ignored.
    pub fn validate_update(
        resource: &ResolvedResource,
        body: &Map<String, Value>,
    ) -> Result<ValidatedFields, AppError> {
        let mut out = ValidatedFields::default();
        for field in resource.fields.iter().filter(|f| f.updatable) {
            let Some(raw) = body.get(&field.name) else { continue };
            match normalize(field, Some(raw))? {
                Some(v) => out.push(&field.name, v),
                None if field.required => {
                    return Err(AppError::Validation(format!("{} cannot be empty", field.name)))
                }
                None if field.kind == FieldKind::List => out.push(&field.name, Value::Array(vec![])),
                None => out.push(&field.name, Value::String(String::new())),
            }
        }
        if out.is_empty() {
            return Err(AppError::Validation("No fields provided to update".into()));
        }
        Ok(out)
    }

    pub fn validate_child(body: &Map<String, Value>) -> Result<NewChild, AppError> {
        let parent_id = body.get("parent_id").and_then(parse_id);
        let author = text_of(body.get("author")).map(|s| sanitize(&s)).filter(|s| !s.is_empty());
        let text = text_of(body.get("text")).map(|s| sanitize(&s)).filter(|s| !s.is_empty());
        match (parent_id, author, text) {
            (Some(parent_id), Some(author), Some(text)) => Ok(NewChild {
                parent_id,
                author,
                text,
            }),
            _ => Err(AppError::Validation(
                "parent_id, author and text are required".into(),
            )),
        }
    }

    /// Pre-write uniqueness check for every unique field in `fields`.
    pub async fn check_unique(
        pool: &SqlitePool,
        resource: &ResolvedResource,
        fields: &ValidatedFields,
        exclude_id: Option<i64>,
    ) -> Result<(), AppError> {
        for field in resource.unique_fields() {
            let Some(value) = fields.get(&field.name) else { continue };
            if Repository::find_duplicate(pool, resource, &field.name, value, exclude_id)
                .await?
                .is_some()
            {
                return Err(AppError::Conflict(format!("{} already exists", field.name)));
            }
        }
        Ok(())
    }
}

fn text_of(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn check_length(field: &FieldSpec, s: &str) -> Result<(), AppError> {
    let len = s.chars().count() as u32;
    if let Some(max) = field.max_length {
        if len > max {
            return Err(AppError::Validation(format!(
                "{} must be at most {} characters",
                field.name, max
            )));
        }
    }
    if let Some(min) = field.min_length {
        if len < min {
            return Err(AppError::Validation(format!(
                "{} must be at least {} characters",
                field.name, min
            )));
        }
    }
    Ok(())
}

/// Normalize one value. `Ok(None)` means absent or blank after sanitizing.
fn normalize(field: &FieldSpec, raw: Option<&Value>) -> Result<Option<Value>, AppError> {
    let raw = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };
    let invalid = |what: &str| AppError::Validation(format!("{} {}", field.name, what));

    if field.kind == FieldKind::List {
        let items = match raw {
            Value::Array(items) => items,
            _ => return Err(invalid("must be a list of strings")),
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let s = item.as_str().ok_or_else(|| invalid("must be a list of strings"))?;
            let s = sanitize(s);
            if !s.is_empty() {
                out.push(Value::String(s));
            }
        }
        if out.is_empty() {
            return Ok(None);
        }
        return Ok(Some(Value::Array(out)));
    }

    let text = text_of(Some(raw)).ok_or_else(|| invalid("must be a string"))?;
    if field.kind == FieldKind::Password {
        if text.is_empty() {
            return Ok(None);
        }
        check_length(field, &text)?;
        return Ok(Some(Value::String(text)));
    }

    let text = sanitize(&text);
    if text.is_empty() {
        return Ok(None);
    }
    match field.kind {
        FieldKind::Email if !EMAIL_RE.is_match(&text) => return Err(invalid("must be a valid email address")),
        FieldKind::Url if !URL_RE.is_match(&text) => return Err(invalid("must be a valid URL")),
        FieldKind::Date => {
            let valid = DATE_RE.is_match(&text) && NaiveDate::parse_from_str(&text, "%Y-%m-%d").is_ok();
            if !valid {
                return Err(invalid("must be a date in YYYY-MM-DD format"));
            }
        }
        _ => {}
    }
    check_length(field, &text)?;
    Ok(Some(Value::String(text)))
}
