//! Admission control, lookup and eviction through the public `JobManager` API.

mod common;

use std::time::Duration;

use common::{FakeVideo, TestHarness};
use pitch_video::jobs::{FrameResolution, JobOptions, JobStatus};
use pitch_video::JobError;

// ── Concurrency limit ──

#[tokio::test]
async fn test_submission_past_limit_is_rejected_not_queued() {
    let harness = TestHarness::gated(3);
    harness.add_video("pitch.mp4", FakeVideo::new(30.0));

    let admitted: Vec<_> = (0..3).map(|_| harness.submit("pitch.mp4")).collect();
    harness.wait_for_gate(3).await;
    assert_eq!(harness.manager.active_jobs(), 3);

    match harness.manager.submit("pitch.mp4", None) {
        Err(JobError::Capacity { active, max }) => assert_eq!((active, max), (3, 3)),
        other => panic!("expected Capacity, got {:?}", other.map(|job| job.id)),
    }
    assert_eq!(harness.manager.registry().len(), 3);

    // One job finishing frees exactly one slot.
    harness.gate().release(1);
    harness.wait_for_active(2).await;
    let late = harness.submit("pitch.mp4");

    harness.gate().release(3);
    for id in admitted.iter().map(|job| &job.id).chain([&late.id]) {
        let job = harness.wait_for_terminal(id).await;
        assert_eq!(job.status, JobStatus::Completed);
    }
    harness.wait_for_active(0).await;
}

#[tokio::test]
async fn test_failed_jobs_release_their_slot() {
    let harness = TestHarness::gated(1);

    let first = harness.submit("https://cdn.example.com/gone.mp4");
    harness.wait_for_terminal(&first.id).await;
    harness.wait_for_active(0).await;

    let second = harness.submit("https://cdn.example.com/also-gone.mp4");
    let job = harness.wait_for_terminal(&second.id).await;
    assert_eq!(job.status, JobStatus::Failed);
}

#[test]
fn test_submit_outside_runtime_fails_without_leaking_a_slot() {
    let harness = TestHarness::new();

    let result = harness.manager.submit("pitch.mp4", None);
    assert!(matches!(result, Err(JobError::RuntimeUnavailable)));
    assert_eq!(harness.manager.active_jobs(), 0);
    assert!(harness.manager.registry().is_empty());
}

// ── Validation ──

#[tokio::test]
async fn test_invalid_submissions_register_nothing() {
    let harness = TestHarness::new();

    let bad_interval = JobOptions {
        frame_interval_secs: 0.0,
        ..JobOptions::default()
    };
    let bad_quality = JobOptions {
        frame_quality: 0,
        ..JobOptions::default()
    };
    let bad_resolution = JobOptions {
        frame_resolution: Some(FrameResolution {
            width: 640,
            height: 0,
        }),
        ..JobOptions::default()
    };

    assert!(matches!(
        harness.manager.submit("", None),
        Err(JobError::InvalidInput(_))
    ));
    for options in [bad_interval, bad_quality, bad_resolution] {
        assert!(matches!(
            harness.manager.submit("pitch.mp4", Some(options)),
            Err(JobError::InvalidInput(_))
        ));
    }

    assert!(harness.manager.registry().is_empty());
    assert_eq!(harness.manager.active_jobs(), 0);
    assert!(harness.diagnostics.errors().is_empty());
}

// ── Lookup ──

#[tokio::test]
async fn test_submit_returns_queued_record_with_trace_id() {
    let harness = TestHarness::new();
    harness.add_video("pitch.mp4", FakeVideo::new(10.0));

    let job = harness.submit("pitch.mp4");
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.progress, 0);
    assert_eq!(job.trace_id, "trace-1");
    assert_eq!(job.source_reference, "pitch.mp4");
    assert_eq!(job.options, *harness.manager.default_options());

    let stored = harness.manager.get(&job.id).expect("registered");
    assert_eq!(stored.trace_id, "trace-1");
    harness.wait_for_terminal(&job.id).await;
}

#[tokio::test]
async fn test_require_unknown_job_is_not_found() {
    let harness = TestHarness::new();
    assert!(harness.manager.get("no-such-job").is_none());
    match harness.manager.require("no-such-job") {
        Err(JobError::NotFound(id)) => assert_eq!(id, "no-such-job"),
        other => panic!("expected NotFound, got {:?}", other.map(|job| job.id)),
    }
}

#[tokio::test]
async fn test_list_is_newest_first_and_filters_by_status() {
    let harness = TestHarness::new();
    harness.add_video("pitch.mp4", FakeVideo::new(10.0));

    let ok = harness.submit("pitch.mp4");
    tokio::time::sleep(Duration::from_millis(5)).await;
    let broken = harness.submit("missing.mp4");
    harness.wait_for_terminal(&ok.id).await;
    harness.wait_for_terminal(&broken.id).await;

    let ids: Vec<_> = harness.manager.list(None).into_iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![broken.id.clone(), ok.id.clone()]);

    let failed = harness.manager.list(Some(JobStatus::Failed));
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, broken.id);
    assert!(harness.manager.list(Some(JobStatus::Queued)).is_empty());
}

#[tokio::test]
async fn test_stats_reflect_registry_and_slots() {
    let harness = TestHarness::gated(2);
    harness.add_video("pitch.mp4", FakeVideo::new(10.0));

    let failed = harness.submit("missing.mp4");
    harness.wait_for_terminal(&failed.id).await;
    harness.wait_for_active(0).await;

    let running = harness.submit("pitch.mp4");
    harness.wait_for_gate(1).await;

    let stats = harness.manager.stats();
    assert_eq!(stats.total_jobs, 2);
    assert_eq!(stats.by_status.failed, 1);
    assert_eq!(stats.by_status.processing, 1);
    assert_eq!(stats.by_status.completed, 0);
    assert_eq!(stats.active_jobs, 1);
    assert_eq!(stats.max_concurrent, 2);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["maxConcurrent"], 2);

    harness.gate().release(1);
    harness.wait_for_terminal(&running.id).await;
}

// ── Eviction ──

#[tokio::test]
async fn test_eviction_keeps_running_jobs() {
    let harness = TestHarness::gated(3);
    harness.add_video("pitch.mp4", FakeVideo::new(10.0));

    let done = harness.submit("missing.mp4");
    harness.wait_for_terminal(&done.id).await;
    let running = harness.submit("pitch.mp4");
    harness.wait_for_gate(1).await;

    assert_eq!(harness.manager.evict_older_than(Duration::from_secs(3600)), 0);
    assert_eq!(harness.manager.evict_older_than(Duration::ZERO), 1);
    assert!(harness.manager.get(&done.id).is_none());
    assert!(harness.manager.get(&running.id).is_some());

    harness.gate().release(1);
    let job = harness.wait_for_terminal(&running.id).await;
    assert_eq!(job.status, JobStatus::Completed);
}
