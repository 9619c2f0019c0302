//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from a resolved resource.

use crate::config::{FieldKind, ResolvedChild, ResolvedResource, SortOrder, CHILD_COLUMNS, CREATED_AT, ID_COLUMN, UPDATED_AT};
use serde_json::Value;

/// Untrusted list parameters as they arrive from the query string.
#[derive(Clone, Debug, Default)]
pub struct ListFilter {
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

/// Quote identifier (safe: only from validated descriptors).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn column_list(cols: &[&str]) -> String {
    cols.iter().map(|c| quoted(c)).collect::<Vec<_>>().join(", ")
}

/// Case-insensitive (Unicode) substring pattern for the connection's REGEXP function.
/// Regex metacharacters in the term are escaped so it matches literally.
fn search_pattern(term: &str) -> String {
    format!("(?i){}", regex::escape(term))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
    /// Positions in `params` that must not be logged.
    secrets: Vec<usize>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    fn push_param(&mut self, v: Value) {
        self.params.push(v);
    }

    fn push_secret(&mut self, v: Value) {
        self.secrets.push(self.params.len());
        self.params.push(v);
    }

    /// Params with secret positions masked, for logging.
    pub fn redacted(&self) -> Vec<Value> {
        self.params
            .iter()
            .enumerate()
            .map(|(i, v)| {
                if self.secrets.contains(&i) {
                    Value::String("***".into())
                } else {
                    v.clone()
                }
            })
            .collect()
    }
}

/// WHERE/ORDER BY fragment for a list request.
///
/// The search term is always bound; sort and order are mapped through the
/// resource whitelist to literal identifiers and keywords, falling back to the
/// resource default without error.
pub fn list_clause(resource: &ResolvedResource, filter: &ListFilter) -> QueryBuf {
    let mut q = QueryBuf::new();

    let term = filter.search.as_deref().map(str::trim).unwrap_or("");
    if !term.is_empty() {
        let pattern = search_pattern(term);
        let ors: Vec<String> = resource
            .searchable_fields()
            .map(|f| {
                q.push_param(Value::String(pattern.clone()));
                format!("{} REGEXP ?", quoted(&f.name))
            })
            .collect();
        if !ors.is_empty() {
            q.sql.push_str(&format!(" WHERE ({})", ors.join(" OR ")));
        }
    }

    let sort = filter
        .sort
        .as_deref()
        .and_then(|s| resource.sortable_column(s.trim()))
        .unwrap_or(resource.default_sort.as_str());
    let order = filter
        .order
        .as_deref()
        .and_then(|o| SortOrder::parse(o.trim()))
        .unwrap_or(resource.default_order);
    q.sql.push_str(&format!(
        " ORDER BY {} {}, {} {}",
        quoted(sort),
        order.keyword(),
        quoted(ID_COLUMN),
        order.keyword()
    ));
    q
}

/// SELECT public columns with the list clause applied.
pub fn select_list(resource: &ResolvedResource, filter: &ListFilter) -> QueryBuf {
    let clause = list_clause(resource, filter);
    QueryBuf {
        sql: format!(
            "SELECT {} FROM {}{}",
            column_list(&resource.public_columns()),
            quoted(&resource.table),
            clause.sql
        ),
        params: clause.params,
        secrets: clause.secrets,
    }
}

pub fn select_by_id(resource: &ResolvedResource, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = ?",
        column_list(&resource.public_columns()),
        quoted(&resource.table),
        quoted(ID_COLUMN)
    );
    q.push_param(Value::from(id));
    q
}

pub fn exists_by_id(resource: &ResolvedResource, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT 1 FROM {} WHERE {} = ?",
        quoted(&resource.table),
        quoted(ID_COLUMN)
    );
    q.push_param(Value::from(id));
    q
}

/// Look up another row holding `value` in a unique field. Emails compare case-insensitively.
pub fn select_duplicate(
    resource: &ResolvedResource,
    field: &str,
    value: &Value,
    exclude_id: Option<i64>,
) -> Option<QueryBuf> {
    let spec = resource.field(field)?;
    let mut q = QueryBuf::new();
    let cmp = if spec.kind == FieldKind::Email {
        format!("LOWER({}) = LOWER(?)", quoted(&spec.name))
    } else {
        format!("{} = ?", quoted(&spec.name))
    };
    q.push_param(value.clone());
    let mut sql = format!(
        "SELECT {} FROM {} WHERE {}",
        quoted(ID_COLUMN),
        quoted(&resource.table),
        cmp
    );
    if let Some(id) = exclude_id {
        sql.push_str(&format!(" AND {} <> ?", quoted(ID_COLUMN)));
        q.push_param(Value::from(id));
    }
    sql.push_str(" LIMIT 1");
    q.sql = sql;
    Some(q)
}

/// INSERT of whitelisted fields plus both timestamps. Unknown names are dropped.
pub fn insert(resource: &ResolvedResource, fields: &[(String, Value)], now: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    for (name, value) in fields {
        let Some(spec) = resource.field(name) else { continue };
        cols.push(quoted(&spec.name));
        if spec.is_secret() {
            q.push_secret(value.clone());
        } else {
            q.push_param(value.clone());
        }
    }
    for ts in [CREATED_AT, UPDATED_AT] {
        cols.push(quoted(ts));
        q.push_param(Value::String(now.to_string()));
    }
    let placeholders = vec!["?"; cols.len()].join(", ");
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quoted(&resource.table),
        cols.join(", "),
        placeholders
    );
    q
}

/// UPDATE by id: SET only updatable whitelisted fields, plus `updated_at`.
/// Returns None when nothing in `fields` survives the whitelist.
pub fn update(
    resource: &ResolvedResource,
    id: i64,
    fields: &[(String, Value)],
    now: &str,
) -> Option<QueryBuf> {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for (name, value) in fields {
        let Some(spec) = resource.field(name) else { continue };
        if !spec.updatable {
            continue;
        }
        sets.push(format!("{} = ?", quoted(&spec.name)));
        q.push_param(value.clone());
    }
    if sets.is_empty() {
        return None;
    }
    sets.push(format!("{} = ?", quoted(UPDATED_AT)));
    q.push_param(Value::String(now.to_string()));
    q.push_param(Value::from(id));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quoted(&resource.table),
        sets.join(", "),
        quoted(ID_COLUMN)
    );
    Some(q)
}

/// SELECT id and stored credential by a unique lookup field.
pub fn select_secret(resource: &ResolvedResource, lookup_field: &str, value: &Value) -> Option<QueryBuf> {
    let secret = resource.password_field()?;
    let lookup = resource.field(lookup_field).filter(|f| f.unique)?;
    let cond = if lookup.kind == FieldKind::Email {
        format!("LOWER({}) = LOWER(?)", quoted(&lookup.name))
    } else {
        format!("{} = ?", quoted(&lookup.name))
    };
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {}, {} FROM {} WHERE {}",
        quoted(ID_COLUMN),
        quoted(&secret.name),
        quoted(&resource.table),
        cond
    );
    q.push_param(value.clone());
    Some(q)
}

pub fn update_secret(resource: &ResolvedResource, id: i64, hash: &str, now: &str) -> Option<QueryBuf> {
    let secret = resource.password_field()?;
    let mut q = QueryBuf::new();
    q.sql = format!(
        "UPDATE {} SET {} = ?, {} = ? WHERE {} = ?",
        quoted(&resource.table),
        quoted(&secret.name),
        quoted(UPDATED_AT),
        quoted(ID_COLUMN)
    );
    q.push_secret(Value::String(hash.to_string()));
    q.push_param(Value::String(now.to_string()));
    q.push_param(Value::from(id));
    Some(q)
}

pub fn delete_by_id(resource: &ResolvedResource, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ?",
        quoted(&resource.table),
        quoted(ID_COLUMN)
    );
    q.push_param(Value::from(id));
    q
}

/// Children of one parent, oldest first.
pub fn select_children(child: &ResolvedChild, parent_id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} WHERE \"parent_id\" = ? ORDER BY {} ASC, {} ASC",
        column_list(CHILD_COLUMNS),
        quoted(&child.table),
        quoted(CREATED_AT),
        quoted(ID_COLUMN)
    );
    q.push_param(Value::from(parent_id));
    q
}

pub fn select_child_by_id(child: &ResolvedChild, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = ?",
        column_list(CHILD_COLUMNS),
        quoted(&child.table),
        quoted(ID_COLUMN)
    );
    q.push_param(Value::from(id));
    q
}

pub fn insert_child(child: &ResolvedChild, parent_id: i64, author: &str, text: &str, now: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "INSERT INTO {} (\"parent_id\", \"author\", \"text\", {}) VALUES (?, ?, ?, ?)",
        quoted(&child.table),
        quoted(CREATED_AT)
    );
    q.push_param(Value::from(parent_id));
    q.push_param(Value::String(author.to_string()));
    q.push_param(Value::String(text.to_string()));
    q.push_param(Value::String(now.to_string()));
    q
}

pub fn delete_children_of(child: &ResolvedChild, parent_id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("DELETE FROM {} WHERE \"parent_id\" = ?", quoted(&child.table));
    q.push_param(Value::from(parent_id));
    q
}

pub fn delete_child(child: &ResolvedChild, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ?",
        quoted(&child.table),
        quoted(ID_COLUMN)
    );
    q.push_param(Value::from(id));
    q
}
