//! Durable workflow state, versioned through the shared store.

use std::sync::Arc;

use parley_core::WorkflowState;
use parley_storage::{KeyPatterns, StateStore, StorageError, Versioned};

/// Persistence adapter for [`WorkflowState`].
///
/// Thin by design: the store provides versioned conditional writes, this
/// adapter only fixes the key layout. The orchestrator is the sole
/// intended writer; a version conflict means a duplicate instance.
pub struct WorkflowStore<S> {
    store: Arc<S>,
}

impl<S> Clone for WorkflowStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: StateStore> WorkflowStore<S> {
    /// Create an adapter over a store.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Load a workflow's state and version.
    pub async fn load(
        &self,
        workflow_id: &str,
    ) -> Result<Option<Versioned<WorkflowState>>, StorageError> {
        self.store
            .get(&KeyPatterns::workflow_state(workflow_id))
            .await
    }

    /// Conditionally persist a workflow's state. `expected_version` of
    /// `None` creates the record.
    pub async fn save(
        &self,
        state: &WorkflowState,
        expected_version: Option<u64>,
    ) -> Result<u64, StorageError> {
        self.store
            .put(
                &KeyPatterns::workflow_state(&state.workflow_id),
                state,
                expected_version,
            )
            .await
    }
}
