//! Statement execution shared by every operation: logging and deadlines.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::db::{Deadline, ExecOutcome, Executor, RowSet};
use crate::dialect::Dialect;
use crate::error::Result;
use crate::registry::Registry;

/// Everything an operation needs besides the database handle.
#[derive(Debug, Clone)]
pub(crate) struct Context {
    pub registry: Arc<Registry>,
    pub dialect: Arc<dyn Dialect>,
    pub debug: bool,
    pub timeout: Option<Duration>,
}

impl Context {
    fn log(&self, sql: &str) {
        if self.debug {
            info!(dialect = self.dialect.name(), sql = %sql, "Executing SQL");
        } else {
            debug!(sql = %sql, "Executing SQL");
        }
    }

    pub async fn execute<X: Executor>(&self, exec: &mut X, sql: &str) -> Result<ExecOutcome> {
        self.log(sql);
        let outcome = match self.timeout {
            Some(limit) => exec.execute_within(sql, Deadline::after(limit)).await?,
            None => exec.execute(sql).await?,
        };
        debug!(rows_affected = outcome.rows_affected, "Statement done");
        Ok(outcome)
    }

    pub async fn fetch<X: Executor>(&self, exec: &mut X, sql: &str) -> Result<RowSet> {
        self.log(sql);
        let rows = match self.timeout {
            Some(limit) => exec.fetch_within(sql, Deadline::after(limit)).await?,
            None => exec.fetch(sql).await?,
        };
        debug!(rows = rows.len(), "Query done");
        Ok(rows)
    }
}
