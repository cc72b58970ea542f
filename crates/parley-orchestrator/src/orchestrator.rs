//! Orchestrator implementation.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use parley_bus::{EnvelopeStream, MessageBus, SubjectPatterns};
use parley_core::{
    AgentDescriptor, Envelope, FailureReason, ResultEnvelope, TaskEnvelope, WorkflowState,
};
use parley_storage::{AgentRegistry, RegistryError, StateStore, StorageError};

use crate::{
    error::OrchestratorError,
    policy::{signal_predicate, GoalPredicate, RoundRobin, SelectionPolicy},
    state::WorkflowStore,
};

/// Orchestrator tuning knobs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Completed turns after which the workflow finishes
    pub max_iterations: u64,
    /// Bounded wait for each dispatched task; applied again after the one
    /// re-publish
    pub result_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            result_timeout: Duration::from_secs(60),
        }
    }
}

/// Where the orchestrator stands for one workflow.
enum Phase {
    Selecting,
    Awaiting { task: TaskEnvelope, republished: bool },
    Evaluating { result: ResultEnvelope },
    Finalizing,
}

/// Sequences agent turns for workflows and owns their durable state.
///
/// One orchestrator may run many workflows, but each workflow must have at
/// most one active orchestrator; conditional writes detect violations.
pub struct Orchestrator<S> {
    bus: Arc<dyn MessageBus>,
    workflows: WorkflowStore<S>,
    registry: AgentRegistry<S>,
    selection: Box<dyn SelectionPolicy>,
    goal: Option<GoalPredicate>,
    config: OrchestratorConfig,
}

impl<S: StateStore> Orchestrator<S> {
    /// Create an orchestrator over a bus and the shared state store. The
    /// registry and workflow state live in separate namespaces of the same
    /// store.
    #[must_use]
    pub fn new(bus: Arc<dyn MessageBus>, store: Arc<S>) -> Self {
        Self {
            bus,
            workflows: WorkflowStore::new(Arc::clone(&store)),
            registry: AgentRegistry::new(store),
            selection: Box::new(RoundRobin),
            goal: None,
            config: OrchestratorConfig::default(),
        }
    }

    /// Override the configuration.
    #[must_use]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the selection policy (default: round-robin).
    #[must_use]
    pub fn with_selection_policy(mut self, policy: impl SelectionPolicy + 'static) -> Self {
        self.selection = Box::new(policy);
        self
    }

    /// Finish early when result content matches this predicate.
    #[must_use]
    pub fn with_goal_predicate(mut self, goal: GoalPredicate) -> Self {
        self.goal = Some(goal);
        self
    }

    /// Finish early when result content contains this signal.
    #[must_use]
    pub fn with_goal_signal(self, signal: impl Into<String>) -> Self {
        self.with_goal_predicate(signal_predicate(signal))
    }

    /// Run a workflow to a terminal status. See [`Self::run_with_shutdown`].
    pub async fn run(
        &self,
        workflow_id: &str,
        input: &str,
    ) -> Result<WorkflowState, OrchestratorError> {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        self.run_with_shutdown(workflow_id, input, shutdown_rx).await
    }

    /// Run a workflow to a terminal status, stopping early if `shutdown`
    /// flips to true.
    ///
    /// Loads or creates the persisted state; a loaded `pending_agent`
    /// (crash recovery) jumps straight to awaiting the in-flight task, with
    /// the correlation id re-derived from `(workflow_id, turn_index)`.
    ///
    /// Returns the terminal state. Logical failures (agent timeout,
    /// generation failure) are persisted as `Failed` and returned as
    /// `Ok`; only infrastructure failures and shutdown produce `Err`,
    /// leaving the workflow `Running` for later resumption.
    #[instrument(skip(self, input, shutdown), fields(workflow_id = %workflow_id))]
    pub async fn run_with_shutdown(
        &self,
        workflow_id: &str,
        input: &str,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<WorkflowState, OrchestratorError> {
        // Subscribe before any publish so no result can slip past the
        // orchestrator between dispatch and wait.
        let results_channel = self
            .bus
            .channel(&SubjectPatterns::workflow_results(workflow_id));
        let mut results = results_channel.subscribe().await?;

        let (mut state, mut version) = match self.workflows.load(workflow_id).await? {
            Some(v) => (v.value, Some(v.version)),
            None => (WorkflowState::new(workflow_id), None),
        };

        if state.is_terminal() {
            debug!(status = ?state.status, "Workflow already terminal");
            return Ok(state);
        }

        let mut phase = match state.pending_agent.clone() {
            Some(agent) => {
                info!(agent = %agent, turn_index = state.turn_index, "Resuming with a task in flight");
                let content = Self::turn_content(&state, input);
                Phase::Awaiting {
                    task: TaskEnvelope::new(workflow_id, state.turn_index, agent, content),
                    republished: false,
                }
            }
            None => Phase::Selecting,
        };

        loop {
            phase = match phase {
                Phase::Selecting => {
                    if state.turn_index >= self.config.max_iterations {
                        state.complete();
                        Phase::Finalizing
                    } else {
                        let agents = self.registry.list().await?;
                        let agent = self
                            .selection
                            .select(&agents, &state)
                            .ok_or(OrchestratorError::NoAgents)?
                            .clone();
                        let task = TaskEnvelope::new(
                            workflow_id,
                            state.turn_index,
                            &agent.name,
                            Self::turn_content(&state, input),
                        );

                        // Persist the pending marker before publishing: a
                        // crash between the two resumes into the wait and
                        // re-issues the task instead of losing the turn.
                        state.pending_agent = Some(agent.name.clone());
                        state.touch();
                        version = Some(self.save(&state, version).await?);

                        self.publish_task(&agent, &task).await?;
                        Phase::Awaiting {
                            task,
                            republished: false,
                        }
                    }
                }
                Phase::Awaiting { task, republished } => {
                    match self.await_result(&mut results, &task, &mut shutdown).await? {
                        Some(result) => Phase::Evaluating { result },
                        None if !republished => {
                            warn!(
                                correlation_id = %task.correlation_id,
                                "No result before timeout, re-publishing task once"
                            );
                            let agent = self.lookup_agent(&task.target_agent).await?;
                            self.publish_task(&agent, &task).await?;
                            Phase::Awaiting {
                                task,
                                republished: true,
                            }
                        }
                        None => {
                            warn!(agent = %task.target_agent, "Agent timed out twice, failing workflow");
                            state.fail(FailureReason::AgentTimeout);
                            Phase::Finalizing
                        }
                    }
                }
                Phase::Evaluating { result } => {
                    if let Some(error) = &result.error {
                        warn!(agent = %result.from, error = ?error, "Agent reported failure");
                        state.fail(FailureReason::GenerationFailed);
                        Phase::Finalizing
                    } else {
                        state.record_turn(&result.from, &result.content);
                        version = Some(self.save(&state, version).await?);

                        let goal_reached =
                            self.goal.as_ref().is_some_and(|goal| goal(&result.content));
                        if state.turn_index >= self.config.max_iterations || goal_reached {
                            state.complete();
                            Phase::Finalizing
                        } else {
                            Phase::Selecting
                        }
                    }
                }
                Phase::Finalizing => {
                    let _ = self.save(&state, version).await?;
                    info!(status = ?state.status, turns = state.turn_index, "Workflow finished");
                    return Ok(state);
                }
            };
        }
    }

    /// Task content for the current turn: the initial input on turn 0, the
    /// previous agent's answer afterwards.
    fn turn_content(state: &WorkflowState, input: &str) -> String {
        state
            .history
            .last()
            .map_or_else(|| input.to_string(), |message| message.content.clone())
    }

    async fn lookup_agent(&self, name: &str) -> Result<AgentDescriptor, OrchestratorError> {
        self.registry.lookup(name).await.map_err(|e| match e {
            RegistryError::NotFound(name) => OrchestratorError::AgentNotFound(name),
            other => OrchestratorError::Registry(other),
        })
    }

    async fn publish_task(
        &self,
        agent: &AgentDescriptor,
        task: &TaskEnvelope,
    ) -> Result<(), OrchestratorError> {
        debug!(
            agent = %agent.name,
            topic = %agent.topic,
            correlation_id = %task.correlation_id,
            "Dispatching task"
        );
        self.bus
            .channel(&agent.topic)
            .publish(&Envelope::Task(task.clone()))
            .await?;
        Ok(())
    }

    /// Wait for the result matching the task's correlation id, bounded by
    /// the configured timeout. Results for other correlation ids are
    /// duplicates or stragglers and are discarded.
    async fn await_result(
        &self,
        results: &mut EnvelopeStream,
        task: &TaskEnvelope,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<Option<ResultEnvelope>, OrchestratorError> {
        let deadline = Instant::now() + self.config.result_timeout;
        let mut shutdown_live = true;

        loop {
            tokio::select! {
                res = shutdown.changed(), if shutdown_live => {
                    match res {
                        Ok(()) if *shutdown.borrow() => return Err(OrchestratorError::Interrupted),
                        Ok(()) => {}
                        Err(_) => shutdown_live = false,
                    }
                }
                next = tokio::time::timeout_at(deadline, results.next()) => {
                    match next {
                        Err(_) => return Ok(None),
                        Ok(None) => {
                            return Err(OrchestratorError::SubscriptionClosed(
                                task.workflow_id.clone(),
                            ))
                        }
                        Ok(Some(Envelope::Result(result)))
                            if result.correlation_id == task.correlation_id =>
                        {
                            return Ok(Some(result))
                        }
                        Ok(Some(envelope)) => {
                            debug!(
                                correlation_id = %envelope.correlation_id(),
                                "Discarding stale or duplicate envelope"
                            );
                        }
                    }
                }
            }
        }
    }

    /// Conditional save with one reload-and-retry. Losing twice means a
    /// duplicate orchestrator owns this workflow, which is fatal for this
    /// instance.
    async fn save(
        &self,
        state: &WorkflowState,
        expected: Option<u64>,
    ) -> Result<u64, OrchestratorError> {
        match self.workflows.save(state, expected).await {
            Ok(version) => Ok(version),
            Err(StorageError::VersionConflict(_)) => {
                warn!(workflow_id = %state.workflow_id, "Conditional write lost, reloading once");
                let fresh = self
                    .workflows
                    .load(&state.workflow_id)
                    .await?
                    .map(|v| v.version);
                match self.workflows.save(state, fresh).await {
                    Ok(version) => Ok(version),
                    Err(StorageError::VersionConflict(_)) => {
                        Err(OrchestratorError::StateConflict(state.workflow_id.clone()))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_content_relays_last_answer() {
        let mut state = WorkflowState::new("wf-1");
        assert_eq!(Orchestrator::<parley_storage::MemoryStore>::turn_content(&state, "Begin"), "Begin");

        state.record_turn("frodo", "I will carry it");
        assert_eq!(
            Orchestrator::<parley_storage::MemoryStore>::turn_content(&state, "Begin"),
            "I will carry it"
        );
    }
}
