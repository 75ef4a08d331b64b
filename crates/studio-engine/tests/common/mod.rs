//! Shared harness for engine integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use studio_core::PricingTable;
use studio_engine::{EngineSettings, InMemoryAssetSink, Orchestrator};
use studio_providers::{
    PollOutcome, ProviderAdapter, ProviderError, ProviderRegistry, Result, Submission,
};
use studio_store::MemoryStore;

/// Adapter whose submit/poll behavior is scripted by the test.
#[derive(Default)]
pub struct ScriptedAdapter {
    submits: Mutex<VecDeque<Result<Submission>>>,
    polls: Mutex<VecDeque<Result<PollOutcome>>>,
    sticky_poll: Mutex<Option<PollOutcome>>,
    submit_calls: AtomicUsize,
    poll_calls: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_submit(&self, result: Result<Submission>) {
        self.submits.lock().unwrap().push_back(result);
    }

    pub fn push_poll(&self, result: Result<PollOutcome>) {
        self.polls.lock().unwrap().push_back(result);
    }

    /// Every poll not covered by `push_poll` returns this outcome.
    pub fn set_sticky_poll(&self, outcome: PollOutcome) {
        *self.sticky_poll.lock().unwrap() = Some(outcome);
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn id(&self) -> &'static str {
        "scripted"
    }

    async fn submit(&self, _request: &studio_core::GenerationRequest) -> Result<Submission> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Unavailable("script exhausted".to_string())))
    }

    async fn poll(&self, _handle: &str) -> Result<PollOutcome> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = self.polls.lock().unwrap().pop_front() {
            return result;
        }
        if let Some(outcome) = self.sticky_poll.lock().unwrap().clone() {
            return Ok(outcome);
        }
        Err(ProviderError::Unavailable("script exhausted".to_string()))
    }
}

pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<InMemoryAssetSink>,
    pub adapter: Arc<ScriptedAdapter>,
}

/// Harness with the default pricing roster all routed to one scripted
/// adapter.
pub fn harness(settings: EngineSettings) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(InMemoryAssetSink::new());
    let adapter = ScriptedAdapter::new();

    let mut registry = ProviderRegistry::new();
    for model_id in ["lumina-image-1", "flux-queue-xl", "vireo-video-1"] {
        registry.register(model_id, adapter.clone() as Arc<dyn ProviderAdapter>);
    }

    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(registry),
        sink.clone(),
        PricingTable::default(),
        settings,
    ));

    Harness {
        orchestrator,
        store,
        sink,
        adapter,
    }
}
