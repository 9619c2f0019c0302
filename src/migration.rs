//! DDL for every parent/child table pair. Idempotent; runs at startup.

use crate::config::{ResolvedChild, ResolvedResource, ResourceRegistry, CREATED_AT, ID_COLUMN, UPDATED_AT};
use crate::error::AppError;
use crate::sql::quoted;
use sqlx::SqlitePool;
use std::collections::HashSet;

pub async fn apply_migrations(pool: &SqlitePool, registry: &ResourceRegistry) -> Result<(), AppError> {
    for resource in &registry.resources {
        sqlx::query(&parent_ddl(resource)).execute(pool).await?;
        add_missing_columns(pool, resource).await?;
        if let Some(child) = &resource.child {
            for stmt in child_ddl(resource, child) {
                sqlx::query(&stmt).execute(pool).await?;
            }
        }
        tracing::debug!(resource = %resource.name, table = %resource.table, "table ready");
    }
    tracing::info!(count = registry.resources.len(), "migrations applied");
    Ok(())
}

fn parent_ddl(resource: &ResolvedResource) -> String {
    let mut cols = vec![format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quoted(ID_COLUMN))];
    for f in &resource.fields {
        let mut def = format!("{} TEXT", quoted(&f.name));
        if f.required {
            def.push_str(" NOT NULL");
        }
        if f.unique {
            def.push_str(" UNIQUE");
        }
        cols.push(def);
    }
    cols.push(format!("{} TEXT NOT NULL", quoted(CREATED_AT)));
    cols.push(format!("{} TEXT NOT NULL", quoted(UPDATED_AT)));
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quoted(&resource.table),
        cols.join(", ")
    )
}

fn child_ddl(parent: &ResolvedResource, child: &ResolvedChild) -> [String; 2] {
    [
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"parent_id\" INTEGER NOT NULL REFERENCES {}(\"id\"), \
             \"author\" TEXT NOT NULL, \
             \"text\" TEXT NOT NULL, \
             {} TEXT NOT NULL)",
            quoted(&child.table),
            quoted(&parent.table),
            quoted(CREATED_AT)
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} (\"parent_id\")",
            quoted(&format!("idx_{}_parent_id", child.table)),
            quoted(&child.table)
        ),
    ]
}

/// Fields added to a descriptor after the table exists become nullable columns.
async fn add_missing_columns(pool: &SqlitePool, resource: &ResolvedResource) -> Result<(), AppError> {
    let existing: HashSet<String> = sqlx::query_scalar::<_, String>("SELECT name FROM pragma_table_info(?)")
        .bind(&resource.table)
        .fetch_all(pool)
        .await?
        .into_iter()
        .collect();
    for f in resource.fields.iter().filter(|f| !existing.contains(&f.name)) {
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} TEXT",
            quoted(&resource.table),
            quoted(&f.name)
        );
        sqlx::query(&sql).execute(pool).await?;
        tracing::info!(table = %resource.table, column = %f.name, "column added");
    }
    Ok(())
}
