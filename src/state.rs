use crate::estimation::QueueEngine;
use crate::storage::QueueStore;

/// Shared state handed to every HTTP handler.
#[derive(Debug, Clone)]
pub struct AppState {
    engine: QueueEngine,
}

impl AppState {
    pub fn new(engine: QueueEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &QueueEngine {
        &self.engine
    }

    pub fn store(&self) -> &dyn QueueStore {
        self.engine.store()
    }
}
