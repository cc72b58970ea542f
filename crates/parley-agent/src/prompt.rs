//! Deterministic prompt construction from persona configuration.

use parley_core::{AgentDescriptor, TaskEnvelope};
use parley_llm::LLMMessage;

/// Build the system prompt for a persona. Pure function of the
/// descriptor, so a restarted agent produces identical prompts.
#[must_use]
pub fn persona_prompt(descriptor: &AgentDescriptor) -> String {
    let mut prompt = format!(
        "You are {name}, a {role}.\n\n## Goal\n{goal}",
        name = descriptor.name,
        role = descriptor.role,
        goal = descriptor.goal,
    );

    if !descriptor.instructions.is_empty() {
        prompt.push_str("\n\n## Instructions\n");
        for (i, instruction) in descriptor.instructions.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, instruction));
        }
    }

    prompt
}

/// Build the full message sequence for one task: persona system prompt,
/// cached conversation context, then the task content as the user turn.
#[must_use]
pub fn task_messages(
    descriptor: &AgentDescriptor,
    task: &TaskEnvelope,
    context: &[LLMMessage],
) -> Vec<LLMMessage> {
    let mut messages = Vec::with_capacity(context.len() + 2);
    messages.push(LLMMessage::system(persona_prompt(descriptor)));
    messages.extend_from_slice(context);
    messages.push(LLMMessage::user(task.content.clone()));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frodo() -> AgentDescriptor {
        AgentDescriptor::new("Frodo", "Hobbit", "Carry the ring", "agents.Frodo.tasks")
            .with_instructions(["Speak with humility", "Stay true to the mission"])
    }

    #[test]
    fn persona_prompt_is_deterministic() {
        let descriptor = frodo();
        assert_eq!(persona_prompt(&descriptor), persona_prompt(&descriptor));
        assert!(persona_prompt(&descriptor).contains("1. Speak with humility"));
        assert!(persona_prompt(&descriptor).contains("2. Stay true to the mission"));
    }

    #[test]
    fn task_messages_sandwich_context() {
        let descriptor = frodo();
        let task = TaskEnvelope::new("wf-1", 2, "Frodo", "What now?");
        let context = vec![
            LLMMessage::user("Begin"),
            LLMMessage::assistant("I will take the ring"),
        ];

        let messages = task_messages(&descriptor, &task, &context);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, parley_llm::Role::System);
        assert_eq!(messages[3], LLMMessage::user("What now?"));
    }
}
