//! Deadline wrapper for whole join runs.
//!
//! The engine API is synchronous. [`run_with_timeout`] moves the engine onto
//! a blocking task and races it against a timer. On expiry the caller gets
//! [`DbError::Timeout`] and loses the engine; the blocking task finishes in
//! the background and drops it.

use std::time::Duration;

use arrow_array::RecordBatch;
use tokio::task::JoinError;

use crate::config::FederationConfig;
use crate::engine::Engine;
use crate::error::DbError;
use crate::join::JoinOrchestrator;

/// Runs a federated join with a deadline.
///
/// Returns the engine together with the batch on success. On failure or
/// expiry the engine is dropped.
pub async fn run_with_timeout(
    mut engine: Engine,
    config: FederationConfig,
    limit: Duration,
) -> Result<(Engine, RecordBatch), DbError> {
    let task = tokio::task::spawn_blocking(move || {
        let result = JoinOrchestrator::new(&mut engine).run(&config);
        result.map(|batch| (engine, batch))
    });

    match tokio::time::timeout(limit, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(task_failure(join_err)),
        Err(_elapsed) => {
            tracing::warn!(limit = ?limit, "federated join timed out, discarding engine");
            Err(DbError::Timeout(limit))
        }
    }
}

/// Re-raises a panic from the join task; anything else is a cancellation.
fn task_failure(err: JoinError) -> DbError {
    if err.is_panic() {
        std::panic::resume_unwind(err.into_panic());
    }
    // Only happens when the runtime shuts down under the task.
    tracing::warn!(error = %err, "federated join task cancelled");
    DbError::Cancelled(err.to_string())
}
