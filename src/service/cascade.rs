//! Atomic parent deletion: children first, then the parent, in one transaction.

use crate::config::ResolvedResource;
use crate::error::AppError;
use crate::service::crud::{execute, fetch_optional};
use crate::sql;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CascadeState {
    Begin,
    VerifyExists,
    DeleteChildren,
    DeleteParent,
    Commit,
    Committed,
    RolledBack,
}

#[derive(Debug)]
pub struct CascadeOutcome {
    /// Every state visited, ending in `Committed`.
    pub trace: Vec<CascadeState>,
    pub children_deleted: u64,
}

impl CascadeOutcome {
    pub fn final_state(&self) -> CascadeState {
        self.trace.last().copied().unwrap_or(CascadeState::Begin)
    }
}

/// A cascade that did not commit. `trace` ends in `RolledBack` once a
/// transaction was open; a failed `Begin` leaves it at `[Begin]`.
#[derive(Error, Debug)]
#[error("cascade delete stopped at {failed_at:?}: {error}")]
pub struct CascadeFailure {
    pub trace: Vec<CascadeState>,
    pub failed_at: CascadeState,
    #[source]
    pub error: AppError,
}

impl CascadeFailure {
    pub fn final_state(&self) -> CascadeState {
        self.trace.last().copied().unwrap_or(CascadeState::Begin)
    }
}

impl From<CascadeFailure> for AppError {
    fn from(f: CascadeFailure) -> Self {
        f.error
    }
}

pub struct CascadeDeleter;

impl CascadeDeleter {
    /// Removes the parent and all its children, or nothing. Any failure after
    /// `Begin` rolls back before the failure is returned.
    pub async fn delete_parent(
        pool: &SqlitePool,
        resource: &ResolvedResource,
        id: i64,
    ) -> Result<CascadeOutcome, CascadeFailure> {
        let mut trace = vec![CascadeState::Begin];
        let mut tx: Transaction<'_, Sqlite> = match pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                return Err(CascadeFailure {
                    trace,
                    failed_at: CascadeState::Begin,
                    error: e.into(),
                })
            }
        };

        match Self::run(&mut *tx, resource, id, &mut trace).await {
            Ok(children_deleted) => {
                trace.push(CascadeState::Commit);
                if let Err(e) = tx.commit().await {
                    // A failed commit leaves nothing applied.
                    tracing::warn!(resource = %resource.name, id, state = ?CascadeState::Commit, error = %e, "cascade delete rolled back");
                    trace.push(CascadeState::RolledBack);
                    return Err(CascadeFailure {
                        trace,
                        failed_at: CascadeState::Commit,
                        error: e.into(),
                    });
                }
                trace.push(CascadeState::Committed);
                tracing::info!(resource = %resource.name, id, children_deleted, "deleted");
                Ok(CascadeOutcome {
                    trace,
                    children_deleted,
                })
            }
            Err(e) => {
                let failed_at = trace.last().copied().unwrap_or(CascadeState::Begin);
                if let Err(rb) = tx.rollback().await {
                    tracing::error!(resource = %resource.name, id, error = %rb, "rollback failed");
                }
                tracing::warn!(resource = %resource.name, id, state = ?failed_at, error = %e, "cascade delete rolled back");
                trace.push(CascadeState::RolledBack);
                Err(CascadeFailure {
                    trace,
                    failed_at,
                    error: e,
                })
            }
        }
    }

    async fn run(
        conn: &mut SqliteConnection,
        resource: &ResolvedResource,
        id: i64,
        trace: &mut Vec<CascadeState>,
    ) -> Result<u64, AppError> {
        trace.push(CascadeState::VerifyExists);
        if fetch_optional(&mut *conn, &sql::exists_by_id(resource, id))
            .await?
            .is_none()
        {
            return Err(AppError::NotFound("Record not found".into()));
        }

        let mut children_deleted = 0;
        if let Some(child) = &resource.child {
            trace.push(CascadeState::DeleteChildren);
            children_deleted = execute(&mut *conn, &sql::delete_children_of(child, id))
                .await?
                .rows_affected();
        }

        trace.push(CascadeState::DeleteParent);
        let done = execute(&mut *conn, &sql::delete_by_id(resource, id)).await?;
        if done.rows_affected() == 0 {
            return Err(AppError::NotFound("Record not found".into()));
        }
        Ok(children_deleted)
    }
}
