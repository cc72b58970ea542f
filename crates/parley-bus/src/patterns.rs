//! Standard subject patterns for orchestrator/agent traffic.

/// Standard subject patterns.
pub struct SubjectPatterns;

impl SubjectPatterns {
    /// Task inbox for an agent.
    #[must_use]
    pub fn agent_tasks(agent_name: &str) -> String {
        format!("agents.{agent_name}.tasks")
    }

    /// Result subject owned by the orchestrator of a workflow. Agents
    /// derive it from the task's workflow id.
    #[must_use]
    pub fn workflow_results(workflow_id: &str) -> String {
        format!("workflows.{workflow_id}.results")
    }

    /// All agent task inboxes (wildcard).
    #[must_use]
    pub fn all_agent_tasks() -> &'static str {
        "agents.*.tasks"
    }

    /// All workflow result subjects (wildcard).
    #[must_use]
    pub fn all_workflow_results() -> &'static str {
        "workflows.*.results"
    }
}
