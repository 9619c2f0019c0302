//! Descriptor validation: identifier safety and whitelist consistency.

use crate::config::resolved::{SortOrder, CREATED_AT, ID_COLUMN, UPDATED_AT};
use crate::config::{FieldKind, ResourceConfig};
use crate::error::ConfigError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").expect("identifier regex"));

const RESERVED: &[&str] = &[ID_COLUMN, CREATED_AT, UPDATED_AT];

fn check_ident(kind: &'static str, name: &str) -> Result<(), ConfigError> {
    if IDENT_RE.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            kind,
            name: name.to_string(),
        })
    }
}

pub fn validate(resources: &[ResourceConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    let mut tables = HashSet::new();

    for r in resources {
        check_ident("resource name", &r.name)?;
        check_ident("table", &r.table)?;
        if !names.insert(r.name.as_str()) {
            return Err(ConfigError::DuplicateResource(r.name.clone()));
        }
        let invalid = |message: String| ConfigError::Invalid {
            resource: r.name.clone(),
            message,
        };
        if !tables.insert(r.table.as_str()) {
            return Err(invalid(format!("table '{}' already used", r.table)));
        }
        if let Some(child) = &r.child {
            check_ident("child kind", &child.kind)?;
            check_ident("child table", &child.table)?;
            if child.kind == r.name {
                return Err(invalid("child kind must differ from resource name".into()));
            }
            if !tables.insert(child.table.as_str()) {
                return Err(invalid(format!("table '{}' already used", child.table)));
            }
        }
        if r.fields.is_empty() {
            return Err(invalid("at least one field required".into()));
        }

        let mut field_names = HashSet::new();
        for f in &r.fields {
            check_ident("field", &f.name)?;
            if RESERVED.contains(&f.name.as_str()) {
                return Err(invalid(format!("field '{}' is reserved", f.name)));
            }
            if !field_names.insert(f.name.as_str()) {
                return Err(ConfigError::DuplicateField {
                    resource: r.name.clone(),
                    field: f.name.clone(),
                });
            }
            if f.kind == FieldKind::Password && (f.searchable || f.sortable || f.unique) {
                return Err(invalid(format!(
                    "password field '{}' cannot be searchable, sortable or unique",
                    f.name
                )));
            }
            if let (Some(min), Some(max)) = (f.min_length, f.max_length) {
                if min > max {
                    return Err(invalid(format!("field '{}': min_length > max_length", f.name)));
                }
            }
        }

        let sort_ok = r.default_sort == CREATED_AT
            || r.fields.iter().any(|f| f.sortable && f.name == r.default_sort);
        if !sort_ok {
            return Err(invalid(format!(
                "default_sort '{}' is not a sortable field",
                r.default_sort
            )));
        }
        if SortOrder::parse(&r.default_order).is_none() {
            return Err(invalid(format!(
                "default_order '{}' must be asc or desc",
                r.default_order
            )));
        }
        if r.fields.iter().filter(|f| f.kind == FieldKind::Password).count() > 1 {
            return Err(invalid("at most one password field".into()));
        }
    }
    Ok(())
}
