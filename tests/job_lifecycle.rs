//! Job queue lifecycle and the file-backed worker.

use anyhow::Result;
use neatdata::io::{DirectorySink, FileLoader, TableFormat, load_table, save_table};
use neatdata::jobs::{JobError, JobOutcome, JobQueue, JobStatus, JobWorker};
use neatdata::service::CleaningService;
use neatdata::transforms::TransformRegistry;
use polars::prelude::*;
use std::sync::Arc;

fn modules(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| (*k).to_owned()).collect()
}

#[test]
fn test_submit_start_complete() {
    let queue = JobQueue::new();
    let job = queue.submit("x", modules(&["trim", "dedupe"]));
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.modules, modules(&["trim", "dedupe"]));
    assert!(job.started_at.is_none());

    assert!(queue.start(&job.id).is_some());
    let started = queue.get(&job.id).expect("job exists");
    assert_eq!(started.status, JobStatus::Processing);
    assert!(started.started_at.is_some());

    let done = queue.complete(&job.id).expect("job completes");
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.completed_at.is_some());
    assert_eq!(done.progress_percent, 100);
    assert_eq!(queue.get(&job.id), Some(done));
    assert!(queue.list_pending().is_empty());
    assert_eq!(queue.stats().completed, 1);
}

#[test]
fn test_terminal_jobs_are_final() {
    let queue = JobQueue::new();

    let completed = queue.submit("a", Vec::new());
    queue.start(&completed.id);
    queue.complete(&completed.id);

    let failed = queue.submit("b", Vec::new());
    queue.start(&failed.id);
    queue.fail(&failed.id, "boom");

    let cancelled = queue.submit("c", Vec::new());
    assert!(queue.cancel(&cancelled.id).is_ok());

    for (id, status) in [
        (&completed.id, JobStatus::Completed),
        (&failed.id, JobStatus::Failed),
        (&cancelled.id, JobStatus::Cancelled),
    ] {
        assert!(queue.start(id).is_none(), "start on {status} job");
        assert!(queue.complete(id).is_none(), "complete on {status} job");
        assert!(queue.fail(id, "again").is_none(), "fail on {status} job");
        assert!(
            matches!(queue.cancel(id), Err(JobError::Conflict { .. })),
            "cancel on {status} job"
        );
        assert_eq!(queue.get(id).map(|j| j.status), Some(status));
    }
    assert_eq!(
        queue.get(&failed.id).and_then(|j| j.error_message).as_deref(),
        Some("boom")
    );
}

#[test]
fn test_progress_is_clamped() {
    let queue = JobQueue::new();
    let job = queue.submit("x", Vec::new());
    queue.start(&job.id);

    for (input, stored) in [(-20, 0), (0, 0), (42, 42), (100, 100), (250, 100), (i64::MIN, 0)] {
        let updated = queue.update_progress(&job.id, input, "processing", "working");
        assert_eq!(updated.map(|j| j.progress_percent), Some(stored));
    }
}

#[test]
fn test_finished_jobs_leave_pending_list() {
    let queue = JobQueue::new();
    let a = queue.submit("a", Vec::new());
    let b = queue.submit("b", Vec::new());
    let c = queue.submit("c", Vec::new());

    queue.start(&a.id);
    queue.complete(&a.id);
    queue.start(&b.id);
    queue.fail(&b.id, "bad input");
    assert!(queue.cancel(&c.id).is_ok());

    assert!(queue.list_pending().is_empty());
    for id in [&a.id, &b.id, &c.id] {
        assert!(queue.get(id).is_some(), "job {id} still retrievable");
    }
    assert_eq!(queue.list_all().len(), 3);
}

#[test]
fn test_unknown_job_operations() {
    let queue = JobQueue::new();
    assert!(queue.start("nope").is_none());
    assert!(queue.complete("nope").is_none());
    assert!(queue.fail("nope", "x").is_none());
    assert!(queue.update_progress("nope", 10, "s", "m").is_none());
    assert!(matches!(queue.cancel("nope"), Err(JobError::NotFound { .. })));
}

#[test]
fn test_worker_processes_files_into_directory() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let good = dir.path().join("people.csv");
    save_table(
        &DataFrame::new(vec![
            Column::new("Full Name".into(), [" Ada ", "Grace", " Ada "]),
            Column::new("Age".into(), ["36", "45", "36"]),
        ])?,
        &good,
    )?;
    let missing = dir.path().join("missing.csv");

    let service = Arc::new(CleaningService::new(Arc::new(
        TransformRegistry::builtins_only(),
    )));
    let keys = modules(&["standardize_headers", "trim_spaces", "drop_duplicates"]);
    let ok_job = service.submit_job(good.to_string_lossy(), keys.clone());
    let bad_job = service.submit_job(missing.to_string_lossy(), keys);

    let sink = DirectorySink::new(dir.path().join("cleaned"), TableFormat::Parquet);
    let expected_output = sink.output_path(&ok_job);
    let worker = JobWorker::new(Arc::clone(&service), Arc::new(FileLoader::default()))
        .with_sink(Arc::new(sink));

    let outcomes = worker.drain();
    assert_eq!(outcomes.len(), 2);
    assert!(matches!(&outcomes[0], JobOutcome::Completed { job_id, .. } if *job_id == ok_job.id));
    assert!(matches!(&outcomes[1], JobOutcome::Failed { job_id, .. } if *job_id == bad_job.id));

    let cleaned = load_table(&expected_output)?;
    assert_eq!(cleaned.height(), 2);
    assert!(cleaned.column("full_name").is_ok());

    let stats = service.queue().stats();
    assert_eq!((stats.completed, stats.failed, stats.pending), (1, 1, 0));
    let finished = service.queue().get(&ok_job.id).expect("job exists");
    assert_eq!(finished.progress_percent, 100);
    Ok(())
}
