use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test]
async fn test_successful_task_reports_ok() {
    let pipeline = WorkerPipeline::with_job(|_| Ok(()));
    assert_eq!(pipeline.execute(b"payload".to_vec()).await, Ok(()));
}

#[tokio::test]
async fn test_job_error_reports_failure() {
    let pipeline = WorkerPipeline::with_job(|_| Err("bad input".to_string()));
    let result = pipeline.execute(Vec::new()).await;
    assert_eq!(result, Err(TaskError::Failed("bad input".to_string())));
}

#[tokio::test]
async fn test_panic_is_isolated_from_caller() {
    let pipeline = WorkerPipeline::with_job(|payload| {
        if payload == b"boom" {
            panic!("fault in worker");
        }
        Ok(())
    });

    let result = pipeline.execute(b"boom".to_vec()).await;
    assert_eq!(result, Err(TaskError::Panicked("fault in worker".to_string())));

    // Pipeline still usable after a fault
    assert_eq!(pipeline.execute(b"fine".to_vec()).await, Ok(()));
}

#[tokio::test]
async fn test_formatted_panic_message_captured() {
    let pipeline = WorkerPipeline::with_job(|payload| panic!("bad length {}", payload.len()));
    let result = pipeline.execute(vec![0; 3]).await;
    assert_eq!(result, Err(TaskError::Panicked("bad length 3".to_string())));
}

#[tokio::test]
async fn test_payload_reaches_worker_thread() {
    let pipeline = WorkerPipeline::with_job(|payload| {
        let name = std::thread::current().name().map(str::to_string);
        if name.as_deref() != Some("vitals-worker") {
            return Err("ran on the wrong thread".to_string());
        }
        if payload != b"vitals" {
            return Err("payload mismatch".to_string());
        }
        Ok(())
    });
    assert_eq!(pipeline.execute(b"vitals".to_vec()).await, Ok(()));
}

#[tokio::test]
async fn test_each_call_runs_exactly_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let pipeline = WorkerPipeline::with_job(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    for _ in 0..5 {
        pipeline.execute(Vec::new()).await.unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_timeout_maps_to_failure() {
    let pipeline = WorkerPipeline::with_job(|_| {
        std::thread::sleep(Duration::from_millis(300));
        Ok(())
    });

    let limit = Duration::from_millis(20);
    let result = pipeline.execute_with_timeout(Vec::new(), limit).await;
    assert_eq!(result, Err(TaskError::TimedOut(limit)));
}

#[tokio::test]
async fn test_default_pipeline_runs_encryption() {
    let pipeline = WorkerPipeline::new(&WorkerConfig {
        rounds: 2,
        ..WorkerConfig::default()
    });
    assert_eq!(pipeline.execute(b"[]".to_vec()).await, Ok(()));
}

#[test]
fn test_report_wire_format() {
    let ok = TaskReport::from(&Ok(()));
    assert_eq!(serde_json::to_string(&ok).unwrap(), r#"{"ok":true}"#);

    let failed = TaskReport::from(&Err(TaskError::Failed("nope".to_string())));
    assert_eq!(
        serde_json::to_string(&failed).unwrap(),
        r#"{"ok":false,"error":"task failed: nope"}"#
    );
}
