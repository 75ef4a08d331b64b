//! Reconciler sweep tests: settlement exactly once, timeouts, recovery.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;

use common::{harness, Harness};
use studio_core::{GenerationParams, GenerationJob, JobStatus, ModelType, UserId};
use studio_engine::{EngineSettings, Reconciler};
use studio_providers::{AsyncHandle, PollOutcome, PollState, Submission};
use studio_store::{AssetStore, JobStore, LedgerStore};

fn completed_poll(urls: &[&str]) -> PollOutcome {
    PollOutcome {
        state: PollState::Completed,
        queue_position: None,
        urls: urls.iter().map(ToString::to_string).collect(),
        error: None,
    }
}

fn failed_poll(error: &str) -> PollOutcome {
    PollOutcome {
        state: PollState::Failed,
        queue_position: None,
        urls: Vec::new(),
        error: Some(error.to_string()),
    }
}

fn reconciler(h: &Harness) -> Reconciler {
    Reconciler::new(Arc::clone(&h.orchestrator), Duration::from_secs(3))
}

/// Submit an async job through the orchestrator; returns its record.
async fn submit_pending(h: &Harness, user: UserId, handle: &str) -> GenerationJob {
    h.adapter.push_submit(Ok(Submission::Pending(AsyncHandle {
        handle: handle.to_string(),
        queue_position: None,
    })));
    let outcome = h
        .orchestrator
        .start_generation(user, "flux-queue-xl", "city", GenerationParams::default())
        .await
        .unwrap();
    match outcome {
        studio_engine::GenerationOutcome::Pending { job, .. } => job,
        studio_engine::GenerationOutcome::Completed { .. } => {
            panic!("expected a pending outcome")
        }
    }
}

#[tokio::test]
async fn completion_is_settled_exactly_once_across_ticks() {
    let h = harness(EngineSettings::default());
    let user = UserId::generate();
    h.store.grant(&user, 10).await.unwrap();

    let job = submit_pending(&h, user, "req-1").await;
    h.adapter
        .set_sticky_poll(completed_poll(&["https://out.example/a.png"]));

    let r = reconciler(&h);
    r.tick().await;
    // The job is terminal now, so a second tick must not double-commit.
    r.tick().await;

    let ledger = h.store.get_ledger(&user).await.unwrap().unwrap();
    assert_eq!(ledger.balance, 8);
    assert_eq!(ledger.reserved, 0);
    assert_eq!(ledger.total_used, 2);

    let stored = h.store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert!(stored.result_url.is_some());
    assert_eq!(h.store.list_for_job(&job.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn racing_sweeps_settle_once() {
    let h = harness(EngineSettings::default());
    let user = UserId::generate();
    h.store.grant(&user, 10).await.unwrap();

    submit_pending(&h, user, "req-1").await;
    h.adapter
        .set_sticky_poll(completed_poll(&["https://out.example/a.png"]));

    let r1 = reconciler(&h);
    let r2 = reconciler(&h);
    join_all([r1.tick(), r2.tick()]).await;

    let ledger = h.store.get_ledger(&user).await.unwrap().unwrap();
    assert_eq!(ledger.total_used, 2);
    assert_eq!(ledger.balance, 8);
    assert_eq!(ledger.reserved, 0);
}

#[tokio::test]
async fn provider_failure_releases_the_hold() {
    let h = harness(EngineSettings::default());
    let user = UserId::generate();
    h.store.grant(&user, 10).await.unwrap();

    let job = submit_pending(&h, user, "req-1").await;
    h.adapter.push_poll(Ok(failed_poll("render node crashed")));

    reconciler(&h).tick().await;

    let ledger = h.store.get_ledger(&user).await.unwrap().unwrap();
    assert_eq!(ledger.balance, 10);
    assert_eq!(ledger.reserved, 0);
    assert_eq!(ledger.total_used, 0);

    let stored = h.store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.error_message.as_deref(), Some("render node crashed"));
}

#[tokio::test]
async fn transient_poll_errors_leave_the_job_in_flight() {
    let h = harness(EngineSettings::default());
    let user = UserId::generate();
    h.store.grant(&user, 10).await.unwrap();

    let job = submit_pending(&h, user, "req-1").await;
    // No scripted poll result: the adapter reports Unavailable.

    reconciler(&h).tick().await;

    let stored = h.store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Queued);
    let ledger = h.store.get_ledger(&user).await.unwrap().unwrap();
    assert_eq!(ledger.reserved, 2);
}

#[tokio::test]
async fn jobs_past_the_ceiling_are_force_failed() {
    let h = harness(EngineSettings::default());
    let user = UserId::generate();
    h.store.grant(&user, 10).await.unwrap();
    h.store.reserve(&user, 3).await.unwrap();

    // A sync submission orphaned by a crash: processing, no handle,
    // started well past the ceiling.
    let mut job = GenerationJob::new(
        user,
        "lumina-image-1",
        ModelType::Image,
        "harbor",
        GenerationParams::default(),
        3,
    );
    job.started_at = Utc::now() - chrono::Duration::minutes(10);
    h.store.create(&job).await.unwrap();

    reconciler(&h).tick().await;

    let stored = h.store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.error_message.as_deref(), Some("generation timed out"));

    let ledger = h.store.get_ledger(&user).await.unwrap().unwrap();
    assert_eq!(ledger.balance, 10);
    assert_eq!(ledger.reserved, 0);
}

#[tokio::test]
async fn reload_recovery_resumes_and_settles_idempotently() {
    let h = harness(EngineSettings::default());
    let user = UserId::generate();
    h.store.grant(&user, 10).await.unwrap();

    let job = submit_pending(&h, user, "req-1").await;

    // Client reattaches: the job is visible as active before settlement.
    let active = h.orchestrator.list_active_jobs(&user).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, job.id);

    h.adapter
        .set_sticky_poll(completed_poll(&["https://out.example/a.png"]));
    let r = reconciler(&h);
    r.tick().await;
    r.tick().await;

    // The job terminated while disconnected; it surfaces via recent.
    assert!(h.orchestrator.list_active_jobs(&user).await.unwrap().is_empty());
    let recent = h
        .orchestrator
        .list_recent_jobs(&user, Utc::now() - chrono::Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, job.id);

    let ledger = h.store.get_ledger(&user).await.unwrap().unwrap();
    assert_eq!(ledger.total_used, 2);
}
