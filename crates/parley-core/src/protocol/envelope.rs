//! Task and result envelopes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Derive the correlation id for a turn.
///
/// Pure function of `(workflow_id, turn_index)`, so a restarted orchestrator
/// re-derives the id of an in-flight task from persisted state alone.
#[must_use]
pub fn correlation_id(workflow_id: &str, turn_index: u64) -> String {
    let seed = format!("{workflow_id}:{turn_index}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()).to_string()
}

/// A task dispatched to one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    /// Workflow this task belongs to
    pub workflow_id: String,
    /// Turn being executed
    pub turn_index: u64,
    /// Name of the agent expected to answer
    pub target_agent: String,
    /// Task text (the prompt input for this turn)
    pub content: String,
    /// Ties the task to its eventual result
    pub correlation_id: String,
}

impl TaskEnvelope {
    /// Create a task for a turn. The correlation id is derived, not random,
    /// so re-publishing the same turn yields an identical envelope.
    #[must_use]
    pub fn new(
        workflow_id: impl Into<String>,
        turn_index: u64,
        target_agent: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let workflow_id = workflow_id.into();
        let correlation_id = correlation_id(&workflow_id, turn_index);
        Self {
            workflow_id,
            turn_index,
            target_agent: target_agent.into(),
            content: content.into(),
            correlation_id,
        }
    }
}

/// Why an agent could not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskError {
    /// The LLM call failed after all retries
    GenerationFailed {
        /// Last provider error, for inspection
        detail: String,
    },
}

/// An agent's answer to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// Correlation id copied from the task
    pub correlation_id: String,
    /// Responding agent name
    pub from: String,
    /// Generated text (empty when `error` is set)
    pub content: String,
    /// Set when the agent could not complete the task
    #[serde(default)]
    pub error: Option<TaskError>,
}

impl ResultEnvelope {
    /// Successful result for a task.
    #[must_use]
    pub fn ok(task: &TaskEnvelope, from: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            correlation_id: task.correlation_id.clone(),
            from: from.into(),
            content: content.into(),
            error: None,
        }
    }

    /// Failed result for a task.
    #[must_use]
    pub fn failed(task: &TaskEnvelope, from: impl Into<String>, error: TaskError) -> Self {
        Self {
            correlation_id: task.correlation_id.clone(),
            from: from.into(),
            content: String::new(),
            error: Some(error),
        }
    }
}

/// The one wire type the bus carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// Orchestrator -> agent
    Task(TaskEnvelope),
    /// Agent -> orchestrator
    Result(ResultEnvelope),
}

impl Envelope {
    /// Correlation id of the enclosed task or result.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        match self {
            Envelope::Task(task) => &task.correlation_id,
            Envelope::Result(result) => &result.correlation_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_id_is_deterministic() {
        assert_eq!(correlation_id("wf-1", 3), correlation_id("wf-1", 3));
        assert_ne!(correlation_id("wf-1", 3), correlation_id("wf-1", 4));
        assert_ne!(correlation_id("wf-1", 3), correlation_id("wf-2", 3));
    }

    #[test]
    fn republished_task_is_identical() {
        let a = TaskEnvelope::new("wf-1", 0, "frodo", "Begin");
        let b = TaskEnvelope::new("wf-1", 0, "frodo", "Begin");
        assert_eq!(a, b);
    }

    #[test]
    fn envelope_roundtrip() {
        let task = TaskEnvelope::new("wf-1", 2, "gandalf", "Your counsel?");
        let wire = serde_json::to_string(&Envelope::Task(task.clone())).unwrap();
        assert!(wire.contains("\"type\":\"task\""));

        let parsed: Envelope = serde_json::from_str(&wire).unwrap();
        assert_eq!(parsed, Envelope::Task(task));
    }

    #[test]
    fn failed_result_carries_detail() {
        let task = TaskEnvelope::new("wf-1", 0, "frodo", "Begin");
        let result = ResultEnvelope::failed(
            &task,
            "frodo",
            TaskError::GenerationFailed {
                detail: "rate limited".to_string(),
            },
        );

        assert_eq!(result.correlation_id, task.correlation_id);
        assert!(result.content.is_empty());
        assert!(matches!(result.error, Some(TaskError::GenerationFailed { .. })));
    }
}
