//! Queue manager contract: spec parsing/validation, listing, counts.

use queuectl_core::{ConfigManager, JobState, ListFilter, QueueError, QueueManager, SortKey};
use queuectl_testing::TempStore;

#[tokio::test]
async fn enqueue_rejects_non_object_spec() {
    let temp = TempStore::new().await.unwrap();
    let queue = QueueManager::new(temp.store);
    let result = queue.validate_and_enqueue("[1,2,3]", 3).await;
    assert!(matches!(result, Err(QueueError::BadSpec(_))));
}

#[tokio::test]
async fn enqueue_rejects_invalid_json() {
    let temp = TempStore::new().await.unwrap();
    let queue = QueueManager::new(temp.store);
    let result = queue.validate_and_enqueue("{not json", 3).await;
    assert!(matches!(result, Err(QueueError::BadSpec(_))));
}

#[tokio::test]
async fn enqueue_rejects_missing_command() {
    let temp = TempStore::new().await.unwrap();
    let queue = QueueManager::new(temp.store);
    let result = queue.validate_and_enqueue(r#"{"priority": 1}"#, 3).await;
    assert!(matches!(result, Err(QueueError::BadSpec(_))));
}

#[tokio::test]
async fn enqueue_rejects_duplicate_id() {
    let temp = TempStore::new().await.unwrap();
    let queue = QueueManager::new(temp.store);
    let spec = r#"{"command": "echo hi", "id": "dup-id"}"#;
    queue.validate_and_enqueue(spec, 3).await.unwrap();
    let result = queue.validate_and_enqueue(spec, 3).await;
    assert!(matches!(result, Err(QueueError::DuplicateId(_))));
}

#[tokio::test]
async fn enqueue_defaults_max_retries_priority_and_run_at() {
    let temp = TempStore::new().await.unwrap();
    let queue = QueueManager::new(temp.store);
    let id = queue
        .validate_and_enqueue(r#"{"command": "echo hi"}"#, 7)
        .await
        .unwrap();

    let job = queue.get(&id).await.unwrap().unwrap();
    assert_eq!(job.max_retries, 7);
    assert_eq!(job.priority, 0);
    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.attempts, 0);
    assert!(job.next_run_at >= job.created_at);
}

#[tokio::test]
async fn list_filters_by_state_and_respects_limit() {
    let temp = TempStore::new().await.unwrap();
    let queue = QueueManager::new(temp.store);
    for i in 0..5 {
        queue
            .validate_and_enqueue(&format!(r#"{{"command": "echo {i}"}}"#), 3)
            .await
            .unwrap();
    }

    let filter = ListFilter {
        state: Some(JobState::Pending),
        since: None,
        limit: 2,
        sort: SortKey::CreatedAtDesc,
    };
    let jobs = queue.list(filter).await.unwrap();
    assert_eq!(jobs.len(), 2);
    for job in jobs {
        assert_eq!(job.state, JobState::Pending);
    }
}

#[tokio::test]
async fn counts_reflects_job_and_dlq_state() {
    let temp = TempStore::new().await.unwrap();
    let queue = QueueManager::new(temp.store);
    queue
        .validate_and_enqueue(r#"{"command": "echo hi"}"#, 3)
        .await
        .unwrap();

    let counts = queue.counts().await.unwrap();
    assert_eq!(counts.pending, 1);
    assert_eq!(counts.processing, 0);
    assert_eq!(counts.dlq, 0);
}

#[tokio::test]
async fn config_manager_falls_back_to_documented_defaults() {
    let temp = TempStore::new().await.unwrap();
    let config = ConfigManager::new(&temp.store);

    assert_eq!(config.get("max_retries").await.unwrap().as_deref(), Some("3"));
    assert_eq!(
        config.get("backoff_base").await.unwrap().as_deref(),
        Some("2")
    );
    assert_eq!(config.get("no_such_key").await.unwrap(), None);

    config.set("max_retries", "9").await.unwrap();
    assert_eq!(config.get("max_retries").await.unwrap().as_deref(), Some("9"));

    let runtime = config.runtime_config().await.unwrap();
    assert_eq!(runtime.max_retries, 9);
    assert_eq!(runtime.backoff_base, 2);
}
