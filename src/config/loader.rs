//! Built-in resource families, JSON descriptor loading, and resolution.

use crate::config::resolved::{FieldSpec, ResolvedChild, ResolvedResource, ResourceRegistry, SortOrder};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

fn with_comments(kind: &str, table: &str) -> Option<ChildConfig> {
    Some(ChildConfig {
        kind: kind.into(),
        table: table.into(),
    })
}

/// The course portal's resource families.
pub fn builtin_resources() -> Vec<ResourceConfig> {
    vec![
        ResourceConfig {
            name: "resources".into(),
            table: "resources".into(),
            child: with_comments("comments", "resource_comments"),
            write_role: Role::User,
            default_sort: "created_at".into(),
            default_order: "desc".into(),
            fields: vec![
                FieldConfig::text("title").required().searchable().sortable().max_length(255),
                FieldConfig::text("description").searchable(),
                FieldConfig::of_kind("link", FieldKind::Url).required().max_length(500),
            ],
        },
        ResourceConfig {
            name: "assignments".into(),
            table: "assignments".into(),
            child: with_comments("comments", "assignment_comments"),
            write_role: Role::User,
            default_sort: "created_at".into(),
            default_order: "asc".into(),
            fields: vec![
                FieldConfig::text("title").required().searchable().sortable().max_length(200),
                FieldConfig::text("description").required().searchable(),
                FieldConfig::of_kind("due_date", FieldKind::Date).required().sortable(),
                FieldConfig::of_kind("files", FieldKind::List),
            ],
        },
        ResourceConfig {
            name: "topics".into(),
            table: "topics".into(),
            child: with_comments("replies", "replies"),
            write_role: Role::User,
            default_sort: "created_at".into(),
            default_order: "desc".into(),
            fields: vec![
                FieldConfig::text("subject").required().searchable().sortable().max_length(255),
                FieldConfig::text("message").required().searchable(),
                FieldConfig::text("author").required().searchable().sortable().max_length(100),
            ],
        },
        ResourceConfig {
            name: "weeks".into(),
            table: "weeks".into(),
            child: with_comments("comments", "week_comments"),
            write_role: Role::User,
            default_sort: "start_date".into(),
            default_order: "asc".into(),
            fields: vec![
                FieldConfig::text("title").required().searchable().sortable().max_length(200),
                FieldConfig::of_kind("start_date", FieldKind::Date).required().sortable(),
                FieldConfig::text("description").required().searchable(),
                FieldConfig::of_kind("links", FieldKind::List),
            ],
        },
        ResourceConfig {
            name: "students".into(),
            table: "students".into(),
            child: None,
            write_role: Role::Admin,
            default_sort: "created_at".into(),
            default_order: "desc".into(),
            fields: vec![
                FieldConfig::text("student_id")
                    .required()
                    .unique()
                    .searchable()
                    .sortable()
                    .max_length(50),
                FieldConfig::text("name").required().searchable().sortable().max_length(100),
                FieldConfig::of_kind("email", FieldKind::Email)
                    .required()
                    .unique()
                    .searchable()
                    .sortable()
                    .max_length(100),
                FieldConfig::of_kind("password", FieldKind::Password).required(),
            ],
        },
    ]
}

/// Load descriptors from a JSON file containing an array of resources.
pub async fn load_from_path(path: &Path) -> Result<Vec<ResourceConfig>, ConfigError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Build the runtime registry from descriptors (validates first).
pub fn resolve(resources: &[ResourceConfig]) -> Result<ResourceRegistry, ConfigError> {
    validate(resources)?;

    let mut out = Vec::with_capacity(resources.len());
    let mut by_name = HashMap::new();
    for r in resources {
        let default_order = SortOrder::parse(&r.default_order).ok_or_else(|| ConfigError::Invalid {
            resource: r.name.clone(),
            message: "default_order".into(),
        })?;
        let resolved = ResolvedResource {
            name: r.name.clone(),
            table: r.table.clone(),
            child: r.child.as_ref().map(|c| ResolvedChild {
                kind: c.kind.clone(),
                table: c.table.clone(),
            }),
            write_role: r.write_role,
            default_sort: r.default_sort.clone(),
            default_order,
            fields: r.fields.iter().map(FieldSpec::from).collect(),
        };
        by_name.insert(r.name.clone(), out.len());
        out.push(resolved);
    }

    Ok(ResourceRegistry {
        resources: out,
        by_name,
    })
}
