//! Standard key patterns for the state store.

/// Standard key patterns. The registry and workflow state share one store
/// but live in separate namespaces.
pub struct KeyPatterns;

impl KeyPatterns {
    /// Durable state of one workflow.
    #[must_use]
    pub fn workflow_state(workflow_id: &str) -> String {
        format!("workflows:{workflow_id}:state")
    }

    /// The shared agent registry.
    #[must_use]
    pub fn agents_registry() -> &'static str {
        "agents:registry"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_stable() {
        assert_eq!(KeyPatterns::workflow_state("wf-1"), "workflows:wf-1:state");
        assert_eq!(KeyPatterns::agents_registry(), "agents:registry");
    }
}
