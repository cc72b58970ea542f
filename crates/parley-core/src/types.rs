//! Core type definitions for the Parley engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sender name used for orchestrator-authored messages.
pub const ORCHESTRATOR_NAME: &str = "orchestrator";

/// Registry entry describing one persona service.
///
/// Immutable after registration; the orchestrator reads it to address tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Unique agent name (registry key)
    pub name: String,
    /// Persona role (e.g., "Hobbit", "Wizard")
    pub role: String,
    /// What the persona is trying to achieve
    pub goal: String,
    /// Persona instructions, in order
    #[serde(default)]
    pub instructions: Vec<String>,
    /// Bus subject the agent consumes tasks from
    pub topic: String,
    /// Registration time (orders round-robin selection)
    pub registered_at: DateTime<Utc>,
}

impl AgentDescriptor {
    /// Create a new descriptor.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        goal: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            goal: goal.into(),
            instructions: Vec::new(),
            topic: topic.into(),
            registered_at: Utc::now(),
        }
    }

    /// Set the persona instructions.
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.instructions = instructions.into_iter().map(Into::into).collect();
        self
    }
}

/// Status of a workflow.
///
/// Transitions only `Running -> Completed` and `Running -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Workflow is in progress (or resumable after a crash)
    #[default]
    Running,
    /// Workflow finished normally
    Completed,
    /// Workflow hit a terminal logical error
    Failed,
}

/// Terminal error kind persisted with a failed workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// No result within the bounded wait, after one re-publish
    AgentTimeout,
    /// The agent exhausted its LLM retries
    GenerationFailed,
}

/// One entry of workflow history. Append-only, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Agent name, or [`ORCHESTRATOR_NAME`]
    pub from: String,
    /// What was said
    pub content: String,
    /// Turn this message completed
    pub turn_index: u64,
}

/// Durable state of one workflow, owned exclusively by its orchestrator.
///
/// Persisted after every transition. A restarted orchestrator reconstructs
/// its position (`pending_agent`, `turn_index`) from the last persisted copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Workflow identifier
    pub workflow_id: String,
    /// Next turn to complete; increases by exactly 1 per completed round
    pub turn_index: u64,
    /// Current status
    pub status: WorkflowStatus,
    /// Conversation so far
    #[serde(default)]
    pub history: Vec<Message>,
    /// Agent with an outstanding task, if any (at most one at a time)
    #[serde(default)]
    pub pending_agent: Option<String>,
    /// Why the workflow failed, when `status == Failed`
    #[serde(default)]
    pub failure: Option<FailureReason>,
    /// Time of the last persisted transition
    pub last_updated: DateTime<Utc>,
}

impl WorkflowState {
    /// Fresh state for a new workflow.
    #[must_use]
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            turn_index: 0,
            status: WorkflowStatus::Running,
            history: Vec::new(),
            pending_agent: None,
            failure: None,
            last_updated: Utc::now(),
        }
    }

    /// Whether the workflow reached a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status != WorkflowStatus::Running
    }

    /// Refresh the `last_updated` timestamp.
    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    /// Complete the current turn: append the agent's message, clear the
    /// pending marker and advance `turn_index`.
    pub fn record_turn(&mut self, from: impl Into<String>, content: impl Into<String>) {
        self.history.push(Message {
            from: from.into(),
            content: content.into(),
            turn_index: self.turn_index,
        });
        self.pending_agent = None;
        self.turn_index += 1;
        self.touch();
    }

    /// Mark the workflow completed. No-op once terminal.
    pub fn complete(&mut self) {
        if self.status == WorkflowStatus::Running {
            self.status = WorkflowStatus::Completed;
            self.pending_agent = None;
            self.touch();
        }
    }

    /// Mark the workflow failed with a reason. No-op once terminal.
    pub fn fail(&mut self, reason: FailureReason) {
        if self.status == WorkflowStatus::Running {
            self.status = WorkflowStatus::Failed;
            self.failure = Some(reason);
            self.pending_agent = None;
            self.touch();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_turn_advances_index_and_clears_pending() {
        let mut state = WorkflowState::new("wf-1");
        state.pending_agent = Some("frodo".to_string());

        state.record_turn("frodo", "I will take the ring");

        assert_eq!(state.turn_index, 1);
        assert!(state.pending_agent.is_none());
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].turn_index, 0);
        assert_eq!(state.history[0].from, "frodo");
    }

    #[test]
    fn terminal_status_is_never_reentered() {
        let mut state = WorkflowState::new("wf-1");
        state.complete();
        assert_eq!(state.status, WorkflowStatus::Completed);

        state.fail(FailureReason::AgentTimeout);
        assert_eq!(state.status, WorkflowStatus::Completed);
        assert!(state.failure.is_none());
    }

    #[test]
    fn fail_records_reason() {
        let mut state = WorkflowState::new("wf-1");
        state.pending_agent = Some("gandalf".to_string());
        state.fail(FailureReason::AgentTimeout);

        assert_eq!(state.status, WorkflowStatus::Failed);
        assert_eq!(state.failure, Some(FailureReason::AgentTimeout));
        assert!(state.pending_agent.is_none());
    }

    #[test]
    fn descriptor_builder_sets_instructions() {
        let descriptor = AgentDescriptor::new("frodo", "Hobbit", "Carry the ring", "agents.frodo.tasks")
            .with_instructions(["Speak with humility", "Stay true to the mission"]);

        assert_eq!(descriptor.instructions.len(), 2);
        assert_eq!(descriptor.topic, "agents.frodo.tasks");
    }
}
