use std::sync::Arc;
use std::time::Duration;

use shared_database::{EventStore, StoreResult};

use crate::models::MonitoringError;

/// Runs a batch of store reads on the blocking pool, bounded by `budget`.
///
/// If the budget elapses the caller gets `QueryTimeout`; the blocking read itself
/// finishes in the background and its result is discarded.
pub async fn run_query<T, F>(
    store: &Arc<dyn EventStore>,
    budget: Duration,
    query: F,
) -> Result<T, MonitoringError>
where
    T: Send + 'static,
    F: FnOnce(&dyn EventStore) -> StoreResult<T> + Send + 'static,
{
    let store = Arc::clone(store);
    let task = tokio::task::spawn_blocking(move || query(store.as_ref()));

    match tokio::time::timeout(budget, task).await {
        Ok(Ok(result)) => result.map_err(MonitoringError::from),
        Ok(Err(join_error)) => Err(MonitoringError::Task(join_error.to_string())),
        Err(_) => Err(MonitoringError::QueryTimeout(budget)),
    }
}

/// Same budget for an arbitrary blocking job that does not touch the store.
pub async fn run_blocking<T, F>(budget: Duration, job: F) -> Result<T, MonitoringError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match tokio::time::timeout(budget, tokio::task::spawn_blocking(job)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_error)) => Err(MonitoringError::Task(join_error.to_string())),
        Err(_) => Err(MonitoringError::QueryTimeout(budget)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_database::{MemoryEventStore, StoreError};
    use std::path::PathBuf;

    fn store() -> Arc<dyn EventStore> {
        Arc::new(MemoryEventStore::new())
    }

    #[tokio::test]
    async fn test_query_result_is_passed_through() {
        let latest = run_query(&store(), Duration::from_secs(1), |s| s.latest_metric_snapshot())
            .await
            .unwrap();
        assert_eq!(latest, None);
    }

    #[tokio::test]
    async fn test_store_error_is_wrapped() {
        let result: Result<(), _> = run_query(&store(), Duration::from_secs(1), |_| {
            Err(StoreError::Unavailable(PathBuf::from("/missing.db")))
        })
        .await;

        assert_matches!(result, Err(MonitoringError::Store(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_slow_query_times_out() {
        let result = run_query(&store(), Duration::from_millis(20), |_| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        })
        .await;

        assert_matches!(result, Err(MonitoringError::QueryTimeout(_)));
    }

    #[tokio::test]
    async fn test_panicking_job_becomes_task_error() {
        let result: Result<(), _> =
            run_blocking(Duration::from_secs(1), || panic!("boom")).await;

        assert_matches!(result, Err(MonitoringError::Task(_)));
    }
}
