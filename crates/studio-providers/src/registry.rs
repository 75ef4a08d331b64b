//! Static model-to-adapter routing.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ProviderAdapter;

/// Maps model ids to the adapter that serves them.
///
/// The mapping is built once at startup; the orchestrator selects an
/// adapter by a plain lookup instead of branching on model ids.
#[derive(Default)]
pub struct ProviderRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a model id to an adapter. Later registrations win.
    pub fn register(&mut self, model_id: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(model_id.into(), adapter);
    }

    /// Look up the adapter serving a model id.
    #[must_use]
    pub fn adapter_for(&self, model_id: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(model_id).cloned()
    }

    /// Model ids with a registered adapter.
    #[must_use]
    pub fn model_ids(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LuminaClient;

    #[test]
    fn lookup_routes_by_model_id() {
        let mut registry = ProviderRegistry::new();
        registry.register(
            "lumina-image-1",
            Arc::new(LuminaClient::new("http://localhost:1", "k")),
        );

        assert!(registry.adapter_for("lumina-image-1").is_some());
        assert!(registry.adapter_for("unknown-model").is_none());
    }
}
