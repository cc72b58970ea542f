//! Agent selection and goal-completion policies.

use parley_core::{AgentDescriptor, WorkflowState};

/// Decides which agent takes the next turn.
pub trait SelectionPolicy: Send + Sync {
    /// Pick an agent for the workflow's current turn. `agents` is ordered
    /// by registration time; returns `None` when the list is empty.
    fn select<'a>(
        &self,
        agents: &'a [AgentDescriptor],
        state: &WorkflowState,
    ) -> Option<&'a AgentDescriptor>;
}

/// Default policy: cycle through agents in registration order.
pub struct RoundRobin;

impl SelectionPolicy for RoundRobin {
    fn select<'a>(
        &self,
        agents: &'a [AgentDescriptor],
        state: &WorkflowState,
    ) -> Option<&'a AgentDescriptor> {
        if agents.is_empty() {
            return None;
        }
        agents.get(state.turn_index as usize % agents.len())
    }
}

/// Predicate over result content deciding whether the goal is reached.
///
/// The goal-signal format is configuration, not engine behavior; see
/// [`signal_predicate`] for the common substring form.
pub type GoalPredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Goal predicate matching a signal substring, case-insensitively.
#[must_use]
pub fn signal_predicate(signal: impl Into<String>) -> GoalPredicate {
    let signal = signal.into().to_lowercase();
    Box::new(move |content| content.to_lowercase().contains(&signal))
}
