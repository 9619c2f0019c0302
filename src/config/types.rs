//! Raw resource descriptors as declared by the developer (Rust literals or JSON).

use serde::{Deserialize, Serialize};

/// How a field is validated, stored and rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Free text; trimmed and stripped of markup.
    Text,
    Email,
    Url,
    /// ISO calendar date, `YYYY-MM-DD`.
    Date,
    /// Sequence of strings, stored JSON-encoded.
    List,
    /// Write-only credential; hashed before storage, never selected.
    Password,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default = "default_true")]
    pub updatable: bool,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub max_length: Option<u32>,
}

fn default_kind() -> FieldKind {
    FieldKind::Text
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChildConfig {
    /// Value of `?resource=` / `?action=` that addresses the child kind (e.g. "comments").
    pub kind: String,
    pub table: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// URL segment, e.g. "weeks".
    pub name: String,
    pub table: String,
    #[serde(default)]
    pub child: Option<ChildConfig>,
    #[serde(default)]
    pub write_role: Role,
    #[serde(default = "default_sort")]
    pub default_sort: String,
    #[serde(default = "default_order")]
    pub default_order: String,
    pub fields: Vec<FieldConfig>,
}

fn default_sort() -> String {
    "created_at".into()
}

fn default_order() -> String {
    "desc".into()
}

impl FieldConfig {
    pub fn text(name: &str) -> Self {
        FieldConfig {
            name: name.into(),
            kind: FieldKind::Text,
            required: false,
            unique: false,
            searchable: false,
            sortable: false,
            updatable: true,
            min_length: None,
            max_length: None,
        }
    }

    pub fn of_kind(name: &str, kind: FieldKind) -> Self {
        FieldConfig {
            kind,
            ..FieldConfig::text(name)
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn max_length(mut self, n: u32) -> Self {
        self.max_length = Some(n);
        self
    }
}
