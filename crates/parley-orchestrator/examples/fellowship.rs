//! Two personas debating over the in-memory bus.
//!
//! Runs a three-turn conversation between a Hobbit and a Wizard without
//! any external services, using scripted generations instead of a real
//! LLM provider. Swap in `parley_llm::OpenAiAdapter` to talk to OpenAI.
//!
//! ```sh
//! cargo run -p parley-orchestrator --example fellowship
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use parley_agent::AgentRuntime;
use parley_bus::{MemoryBus, MessageBus, SubjectPatterns};
use parley_core::AgentDescriptor;
use parley_llm::{LLMAdapter, LLMError, LLMMessage, LLMResponse, TokenUsage};
use parley_orchestrator::{Orchestrator, OrchestratorConfig};
use parley_storage::{AgentRegistry, MemoryStore};

/// Stands in for a real provider: answers from a fixed script.
struct ScriptedAdapter {
    lines: Vec<&'static str>,
    next: AtomicUsize,
}

impl ScriptedAdapter {
    fn new(lines: Vec<&'static str>) -> Self {
        Self {
            lines,
            next: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LLMAdapter for ScriptedAdapter {
    fn provider(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "fellowship-demo"
    }

    async fn generate(&self, _messages: &[LLMMessage]) -> Result<LLMResponse, LLMError> {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        let line = self
            .lines
            .get(index % self.lines.len())
            .copied()
            .ok_or(LLMError::EmptyResponse)?;
        Ok(LLMResponse {
            content: line.to_string(),
            tokens_used: TokenUsage::default(),
            model: "fellowship-demo".to_string(),
        })
    }

    async fn health_check(&self) -> Result<bool, LLMError> {
        Ok(true)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let bus = Arc::new(MemoryBus::new());
    let store = Arc::new(MemoryStore::new());
    let (shutdown, _) = watch::channel(false);

    let personas = [
        (
            AgentDescriptor::new(
                "Frodo",
                "Hobbit",
                "Carry the ring to Mordor",
                SubjectPatterns::agent_tasks("Frodo"),
            )
            .with_instructions(["Speak with humility", "Stay true to the quest"]),
            ScriptedAdapter::new(vec![
                "I will take the ring to Mordor, though I do not know the way.",
                "The burden grows heavier, but I will not turn back.",
            ]),
        ),
        (
            AgentDescriptor::new(
                "Gandalf",
                "Wizard",
                "Guide the fellowship",
                SubjectPatterns::agent_tasks("Gandalf"),
            )
            .with_instructions(["Offer counsel", "Speak in riddles when it helps"]),
            ScriptedAdapter::new(vec![
                "I will help you bear this burden, Frodo, as long as it is yours to bear.",
                "Even the smallest person can change the course of the future.",
            ]),
        ),
    ];

    let mut runtimes = Vec::new();
    for (descriptor, adapter) in personas {
        let name = descriptor.name.clone();
        let runtime = AgentRuntime::new(
            descriptor,
            Arc::new(adapter),
            bus.clone() as Arc<dyn MessageBus>,
            AgentRegistry::new(Arc::clone(&store)),
        );
        let rx = shutdown.subscribe();
        runtimes.push(tokio::spawn(async move { runtime.serve(rx).await }));

        let registry = AgentRegistry::new(Arc::clone(&store));
        while registry.lookup(&name).await.is_err() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }

    let orchestrator = Orchestrator::new(bus.clone() as Arc<dyn MessageBus>, Arc::clone(&store))
        .with_config(OrchestratorConfig {
            max_iterations: 3,
            ..OrchestratorConfig::default()
        });

    let state = orchestrator
        .run("fellowship", "Who will take the ring to Mordor?")
        .await?;

    println!("\n--- transcript ({:?}) ---", state.status);
    for message in &state.history {
        println!("[turn {}] {}: {}", message.turn_index, message.from, message.content);
    }

    shutdown.send(true)?;
    for handle in runtimes {
        handle.await??;
    }
    Ok(())
}
