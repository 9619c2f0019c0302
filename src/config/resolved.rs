//! Resolved resource model: descriptors validated and flattened for runtime use.

use crate::config::{FieldConfig, FieldKind, Role};
use std::collections::HashMap;

/// Columns every parent table carries in addition to its declared fields.
pub const ID_COLUMN: &str = "id";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// Child tables have a fixed shape regardless of resource family.
pub const CHILD_COLUMNS: &[&str] = &["id", "parent_id", "author", "text", "created_at"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Accepts exactly `asc` or `desc`, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("asc") {
            Some(SortOrder::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Some(SortOrder::Desc)
        } else {
            None
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub unique: bool,
    pub searchable: bool,
    pub sortable: bool,
    pub updatable: bool,
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
}

impl FieldSpec {
    pub fn is_secret(&self) -> bool {
        self.kind == FieldKind::Password
    }
}

impl From<&FieldConfig> for FieldSpec {
    fn from(c: &FieldConfig) -> Self {
        let min_length = match (c.kind, c.min_length) {
            (FieldKind::Password, None) => Some(8),
            (_, n) => n,
        };
        FieldSpec {
            name: c.name.clone(),
            kind: c.kind,
            required: c.required,
            unique: c.unique,
            searchable: c.searchable,
            sortable: c.sortable,
            updatable: c.updatable && c.kind != FieldKind::Password,
            min_length,
            max_length: c.max_length,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedChild {
    pub kind: String,
    pub table: String,
}

/// One resource family: its parent table, optional child table, and field whitelist.
#[derive(Clone, Debug)]
pub struct ResolvedResource {
    pub name: String,
    pub table: String,
    pub child: Option<ResolvedChild>,
    pub write_role: Role,
    pub default_sort: String,
    pub default_order: SortOrder,
    pub fields: Vec<FieldSpec>,
}

impl ResolvedResource {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Columns returned by list/get: id, every non-secret field, timestamps.
    pub fn public_columns(&self) -> Vec<&str> {
        let mut cols = vec![ID_COLUMN];
        cols.extend(self.fields.iter().filter(|f| !f.is_secret()).map(|f| f.name.as_str()));
        cols.push(CREATED_AT);
        cols.push(UPDATED_AT);
        cols
    }

    pub fn searchable_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.searchable && !f.is_secret())
    }

    /// Maps a requested sort field to a whitelisted column name, or None.
    pub fn sortable_column(&self, requested: &str) -> Option<&str> {
        if requested == CREATED_AT {
            return Some(CREATED_AT);
        }
        self.fields
            .iter()
            .find(|f| f.sortable && f.name == requested)
            .map(|f| f.name.as_str())
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.unique)
    }

    pub fn password_field(&self) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.is_secret())
    }

    pub fn child_kind(&self) -> Option<&str> {
        self.child.as_ref().map(|c| c.kind.as_str())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResourceRegistry {
    pub resources: Vec<ResolvedResource>,
    pub by_name: HashMap<String, usize>,
}

impl ResourceRegistry {
    pub fn get(&self, name: &str) -> Option<&ResolvedResource> {
        self.by_name.get(name).map(|&i| &self.resources[i])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(|r| r.name.as_str())
    }
}
