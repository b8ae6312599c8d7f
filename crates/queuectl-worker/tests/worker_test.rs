//! Worker loop: registration, claim/execute/report, and cleanup on
//! graceful shutdown.

use std::time::{Duration, Instant};

use queuectl_core::{JobState, QueueManager};
use queuectl_testing::{JobBuilder, TempStore};
use queuectl_worker::WorkerRuntime;

#[tokio::test]
async fn worker_registers_itself_on_startup() {
    let temp = TempStore::new().await.unwrap();
    let queue = QueueManager::new(temp.store);

    let runtime = WorkerRuntime::new(queue.clone(), 50).await.unwrap();
    let active = queue.store().active_workers(30).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].worker_id, runtime.worker_id());
}

#[tokio::test]
async fn worker_claims_executes_and_completes_a_job() {
    let temp = TempStore::new().await.unwrap();
    let queue = QueueManager::new(temp.store);

    let job = JobBuilder::new("ok-job", "exit 0").build();
    queue.store().insert_job(&job).await.unwrap();

    let mut runtime = WorkerRuntime::new(queue.clone(), 20).await.unwrap();
    let handle = runtime.handle();
    let task = tokio::spawn(async move { runtime.run().await });

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let job = queue.get("ok-job").await.unwrap().unwrap();
        if job.state == JobState::Completed {
            break;
        }
        assert!(Instant::now() < deadline, "job never completed");
        tokio::time::sleep(Duration::from_millis(15)).await;
    }

    handle.stop();
    task.await.unwrap().unwrap();

    assert!(queue.store().active_workers(30).await.unwrap().is_empty());
}

#[tokio::test]
async fn worker_reports_a_failing_command_with_its_exit_code() {
    let temp = TempStore::new().await.unwrap();
    let queue = QueueManager::new(temp.store);

    let job = JobBuilder::new("bad-job", "echo nope 1>&2; exit 9")
        .max_retries(5)
        .build();
    queue.store().insert_job(&job).await.unwrap();

    let mut runtime = WorkerRuntime::new(queue.clone(), 20).await.unwrap();
    let handle = runtime.handle();
    let task = tokio::spawn(async move { runtime.run().await });

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let job = queue.get("bad-job").await.unwrap().unwrap();
        if job.attempts > 0 {
            break;
        }
        assert!(Instant::now() < deadline, "job never failed");
        tokio::time::sleep(Duration::from_millis(15)).await;
    }

    handle.stop();
    task.await.unwrap().unwrap();

    let job = queue.get("bad-job").await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Pending);
    assert!(job
        .last_error
        .as_deref()
        .unwrap()
        .starts_with("Command failed with exit code 9"));
}

#[tokio::test]
async fn stop_drains_the_loop_and_unregisters_the_worker() {
    let temp = TempStore::new().await.unwrap();
    let queue = QueueManager::new(temp.store);

    let mut runtime = WorkerRuntime::new(queue.clone(), 20).await.unwrap();
    let worker_id = runtime.worker_id().to_string();
    let handle = runtime.handle();
    let task = tokio::spawn(async move { runtime.run().await });

    tokio::time::sleep(Duration::from_millis(60)).await;
    handle.stop();
    task.await.unwrap().unwrap();

    let active = queue.store().active_workers(30).await.unwrap();
    assert!(active.iter().all(|w| w.worker_id != worker_id));
}

#[tokio::test]
async fn a_job_still_running_when_the_task_is_killed_is_left_for_the_sweeper() {
    // A graceful stop() only takes effect between jobs; a job mid-execution
    // when the process dies outright is recovered by the sweeper instead,
    // not by this worker's own cleanup.
    let temp = TempStore::new().await.unwrap();
    let queue = QueueManager::new(temp.store);

    let job = JobBuilder::new("slow-job", "sleep 2").build();
    queue.store().insert_job(&job).await.unwrap();

    let mut runtime = WorkerRuntime::new(queue.clone(), 20).await.unwrap();
    let task = tokio::spawn(async move { runtime.run().await });

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let job = queue.get("slow-job").await.unwrap().unwrap();
        if job.state == JobState::Processing {
            break;
        }
        assert!(Instant::now() < deadline, "job was never claimed");
        tokio::time::sleep(Duration::from_millis(15)).await;
    }

    task.abort();

    let job = queue.get("slow-job").await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Processing, "orphaned, not cleaned up in-process");
}
