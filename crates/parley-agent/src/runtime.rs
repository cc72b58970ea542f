//! Agent runtime implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, instrument, warn};

use parley_bus::{MessageBus, SubjectPatterns};
use parley_core::{AgentDescriptor, Envelope, ResultEnvelope, TaskEnvelope, TaskError};
use parley_llm::{LLMAdapter, LLMMessage, RetryPolicy};
use parley_storage::{AgentRegistry, StateStore};

use crate::{error::AgentRuntimeError, prompt};

/// Current status of an agent runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentStatus {
    /// Waiting for tasks
    #[default]
    Idle,
    /// Processing a task
    Busy,
    /// Shut down
    Stopped,
}

/// Runtime tuning knobs.
#[derive(Debug, Clone)]
pub struct AgentRuntimeConfig {
    /// Retry policy for LLM calls
    pub retry: RetryPolicy,
    /// Cached conversation messages kept per workflow
    pub history_limit: usize,
    /// Workflow conversation caches kept before evicting the least
    /// recently used
    pub context_capacity: usize,
    /// Answered results remembered for duplicate-task replay
    pub dedup_capacity: usize,
}

impl Default for AgentRuntimeConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            history_limit: 16,
            context_capacity: 64,
            dedup_capacity: 128,
        }
    }
}

#[derive(Debug, Default)]
struct RuntimeState {
    status: AgentStatus,
    tasks_completed: u64,
    tasks_failed: u64,
}

/// Bounded cache of recently produced results, keyed by correlation id.
///
/// The bus delivers at-least-once and the orchestrator re-publishes a
/// turn it never heard back from, so a duplicate task must replay the
/// answer already produced instead of regenerating or staying silent.
struct RecentResults {
    capacity: usize,
    order: VecDeque<String>,
    results: HashMap<String, ResultEnvelope>,
}

impl RecentResults {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            results: HashMap::new(),
        }
    }

    fn get(&self, correlation_id: &str) -> Option<&ResultEnvelope> {
        self.results.get(correlation_id)
    }

    fn insert(&mut self, result: ResultEnvelope) {
        if !self.results.contains_key(&result.correlation_id) {
            if self.order.len() == self.capacity {
                if let Some(evicted) = self.order.pop_front() {
                    self.results.remove(&evicted);
                }
            }
            self.order.push_back(result.correlation_id.clone());
        }
        self.results.insert(result.correlation_id.clone(), result);
    }
}

/// Per-workflow conversation caches with least-recently-used eviction,
/// so an agent serving many workflows stays bounded.
struct WorkflowContexts {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, Vec<LLMMessage>>,
}

impl WorkflowContexts {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    /// Context for a workflow, created on first use and promoted to
    /// most-recently-used.
    fn entry(&mut self, workflow_id: &str) -> &mut Vec<LLMMessage> {
        if self.entries.contains_key(workflow_id) {
            if let Some(pos) = self.order.iter().position(|id| id == workflow_id) {
                self.order.remove(pos);
            }
        } else if self.entries.len() == self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
        self.order.push_back(workflow_id.to_string());
        self.entries.entry(workflow_id.to_string()).or_default()
    }
}

/// One persona service: `Idle -> Processing -> Idle` per task.
///
/// Tasks are consumed sequentially from the agent's subject, so a single
/// runtime never overlaps generations; later deliveries queue on the bus.
pub struct AgentRuntime<L, S> {
    descriptor: AgentDescriptor,
    llm: Arc<L>,
    bus: Arc<dyn MessageBus>,
    registry: AgentRegistry<S>,
    config: AgentRuntimeConfig,
    state: RwLock<RuntimeState>,
}

impl<L: LLMAdapter, S: StateStore> AgentRuntime<L, S> {
    /// Create a runtime with default configuration.
    #[must_use]
    pub fn new(
        descriptor: AgentDescriptor,
        llm: Arc<L>,
        bus: Arc<dyn MessageBus>,
        registry: AgentRegistry<S>,
    ) -> Self {
        Self {
            descriptor,
            llm,
            bus,
            registry,
            config: AgentRuntimeConfig::default(),
            state: RwLock::new(RuntimeState::default()),
        }
    }

    /// Override the runtime configuration.
    #[must_use]
    pub fn with_config(mut self, config: AgentRuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// The persona this runtime serves.
    #[must_use]
    pub fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    /// Current runtime status.
    pub async fn status(&self) -> AgentStatus {
        self.state.read().await.status
    }

    /// Completed and failed task counts.
    pub async fn task_counts(&self) -> (u64, u64) {
        let state = self.state.read().await;
        (state.tasks_completed, state.tasks_failed)
    }

    /// Run the agent until `shutdown` flips to true.
    ///
    /// Subscribes to the task subject first, then registers, so that any
    /// task addressed to a registered agent has a live subscription.
    /// Deregisters best-effort on the way out.
    ///
    /// # Errors
    ///
    /// Returns an error if registration or the subscription fails; task
    /// processing itself never errors out of this loop.
    #[instrument(skip(self, shutdown), fields(agent = %self.descriptor.name, topic = %self.descriptor.topic))]
    pub async fn serve(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), AgentRuntimeError> {
        let channel = self.bus.channel(&self.descriptor.topic);
        let mut tasks = channel.subscribe().await?;

        self.registry.register(self.descriptor.clone()).await?;
        info!("Agent online");

        let mut recent = RecentResults::new(self.config.dedup_capacity);
        let mut contexts = WorkflowContexts::new(self.config.context_capacity);
        let mut shutdown_live = true;

        loop {
            tokio::select! {
                res = shutdown.changed(), if shutdown_live => {
                    match res {
                        Ok(()) if *shutdown.borrow() => break,
                        Ok(()) => {}
                        Err(_) => shutdown_live = false,
                    }
                }
                next = tasks.next() => {
                    match next {
                        Some(Envelope::Task(task)) if task.target_agent == self.descriptor.name => {
                            // A duplicate means the orchestrator never saw the
                            // answer (re-publish after timeout, or a plain
                            // double delivery). Replay the cached result
                            // instead of regenerating or staying silent.
                            if let Some(result) = recent.get(&task.correlation_id).cloned() {
                                debug!(correlation_id = %task.correlation_id, "Duplicate task delivery, re-publishing cached result");
                                self.publish_result(&task.workflow_id, &result).await;
                                continue;
                            }
                            let result = self.process(task, &mut contexts).await;
                            recent.insert(result);
                        }
                        Some(envelope) => {
                            debug!(correlation_id = %envelope.correlation_id(), "Ignoring envelope not addressed to this agent");
                        }
                        None => {
                            self.shutdown_cleanup().await;
                            return Err(AgentRuntimeError::SubscriptionClosed(
                                self.descriptor.topic.clone(),
                            ));
                        }
                    }
                }
            }
        }

        self.shutdown_cleanup().await;
        info!("Agent stopped");
        Ok(())
    }

    /// Handle one task: think, then respond. Failures are reported through
    /// the result channel, never panicked or propagated. Returns the
    /// result so the caller can cache it for duplicate-task replay.
    async fn process(&self, task: TaskEnvelope, contexts: &mut WorkflowContexts) -> ResultEnvelope {
        info!(
            workflow_id = %task.workflow_id,
            turn_index = task.turn_index,
            correlation_id = %task.correlation_id,
            "Processing task"
        );
        self.state.write().await.status = AgentStatus::Busy;

        let context = contexts.entry(&task.workflow_id);
        let messages = prompt::task_messages(&self.descriptor, &task, context);

        let result = match self.config.retry.generate(self.llm.as_ref(), &messages).await {
            Ok(response) => {
                debug!(tokens = response.tokens_used.total, "Generation complete");

                context.push(LLMMessage::user(task.content.clone()));
                context.push(LLMMessage::assistant(response.content.clone()));
                let overflow = context.len().saturating_sub(self.config.history_limit);
                if overflow > 0 {
                    context.drain(..overflow);
                }

                self.state.write().await.tasks_completed += 1;
                ResultEnvelope::ok(&task, &self.descriptor.name, response.content)
            }
            Err(e) => {
                error!(error = %e, "Generation failed, retries exhausted");
                self.state.write().await.tasks_failed += 1;
                ResultEnvelope::failed(
                    &task,
                    &self.descriptor.name,
                    TaskError::GenerationFailed {
                        detail: e.to_string(),
                    },
                )
            }
        };

        self.publish_result(&task.workflow_id, &result).await;
        self.state.write().await.status = AgentStatus::Idle;
        result
    }

    /// Publish a result to the workflow's result subject. A failed publish
    /// is recovered by the orchestrator's re-publish, which replays the
    /// cached result.
    async fn publish_result(&self, workflow_id: &str, result: &ResultEnvelope) {
        let subject = SubjectPatterns::workflow_results(workflow_id);
        if let Err(e) = self
            .bus
            .channel(&subject)
            .publish(&Envelope::Result(result.clone()))
            .await
        {
            warn!(error = %e, subject = %subject, "Failed to publish result");
        }
    }

    async fn shutdown_cleanup(&self) {
        if let Err(e) = self.registry.deregister(&self.descriptor.name).await {
            warn!(error = %e, "Deregistration failed, leaving stale registry entry");
        }
        self.state.write().await.status = AgentStatus::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use parley_bus::{Channel, MemoryBus};
    use parley_llm::{LLMError, LLMResponse, TokenUsage};
    use parley_storage::MemoryStore;

    struct StaticAdapter {
        reply: &'static str,
        calls: AtomicU32,
        fail: bool,
    }

    impl StaticAdapter {
        fn new(reply: &'static str) -> Self {
            Self {
                reply,
                calls: AtomicU32::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                reply: "",
                calls: AtomicU32::new(0),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl LLMAdapter for StaticAdapter {
        fn provider(&self) -> &str {
            "static"
        }

        fn model(&self) -> &str {
            "test"
        }

        async fn generate(&self, _messages: &[LLMMessage]) -> Result<LLMResponse, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LLMError::ApiError("provider down".to_string()));
            }
            Ok(LLMResponse {
                content: self.reply.to_string(),
                tokens_used: TokenUsage::default(),
                model: "test".to_string(),
            })
        }

        async fn health_check(&self) -> Result<bool, LLMError> {
            Ok(true)
        }
    }

    fn frodo() -> AgentDescriptor {
        AgentDescriptor::new("Frodo", "Hobbit", "Carry the ring", SubjectPatterns::agent_tasks("Frodo"))
    }

    struct Harness {
        bus: Arc<MemoryBus>,
        registry: AgentRegistry<MemoryStore>,
        llm: Arc<StaticAdapter>,
        shutdown: watch::Sender<bool>,
        handle: tokio::task::JoinHandle<Result<(), AgentRuntimeError>>,
    }

    async fn spawn_runtime(llm: StaticAdapter) -> Harness {
        let bus = Arc::new(MemoryBus::new());
        let registry = AgentRegistry::new(Arc::new(MemoryStore::new()));
        let llm = Arc::new(llm);
        let runtime = AgentRuntime::new(
            frodo(),
            Arc::clone(&llm),
            bus.clone() as Arc<dyn MessageBus>,
            registry.clone(),
        );

        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { runtime.serve(rx).await });

        // Registration happens after the subscription is live.
        while registry.lookup("Frodo").await.is_err() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        Harness {
            bus,
            registry,
            llm,
            shutdown,
            handle,
        }
    }

    #[tokio::test]
    async fn answers_task_with_matching_correlation_id() {
        let h = spawn_runtime(StaticAdapter::new("I will carry it")).await;

        let results = h.bus.channel(&SubjectPatterns::workflow_results("wf-1"));
        let mut stream = results.subscribe().await.unwrap();

        let task = TaskEnvelope::new("wf-1", 0, "Frodo", "Will you take the ring?");
        h.bus
            .channel(&SubjectPatterns::agent_tasks("Frodo"))
            .publish(&Envelope::Task(task.clone()))
            .await
            .unwrap();

        let Some(Envelope::Result(result)) = stream.next().await else {
            panic!("expected a result envelope");
        };
        assert_eq!(result.correlation_id, task.correlation_id);
        assert_eq!(result.from, "Frodo");
        assert_eq!(result.content, "I will carry it");
        assert!(result.error.is_none());

        h.shutdown.send(true).unwrap();
        h.handle.await.unwrap().unwrap();
        assert!(h.registry.lookup("Frodo").await.is_err());
    }

    #[tokio::test]
    async fn duplicate_delivery_replays_result_without_regenerating() {
        let h = spawn_runtime(StaticAdapter::new("once")).await;

        let results = h.bus.channel(&SubjectPatterns::workflow_results("wf-1"));
        let mut stream = results.subscribe().await.unwrap();

        let task = TaskEnvelope::new("wf-1", 0, "Frodo", "Speak");
        let inbox = h.bus.channel(&SubjectPatterns::agent_tasks("Frodo"));
        inbox.publish(&Envelope::Task(task.clone())).await.unwrap();
        inbox.publish(&Envelope::Task(task.clone())).await.unwrap();

        let Some(Envelope::Result(first)) = stream.next().await else {
            panic!("expected a result envelope");
        };
        let Some(Envelope::Result(second)) = stream.next().await else {
            panic!("expected a replayed result envelope");
        };

        // The duplicate replays the cached answer, one generation total.
        assert_eq!(second, first);
        assert_eq!(h.llm.calls.load(Ordering::SeqCst), 1);

        h.shutdown.send(true).unwrap();
        h.handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn republished_task_reaches_a_late_subscriber() {
        let h = spawn_runtime(StaticAdapter::new("I will carry it")).await;

        let results = h.bus.channel(&SubjectPatterns::workflow_results("wf-1"));
        let task = TaskEnvelope::new("wf-1", 0, "Frodo", "Speak");
        let inbox = h.bus.channel(&SubjectPatterns::agent_tasks("Frodo"));

        // First answer lands while nobody is subscribed and is dropped.
        inbox.publish(&Envelope::Task(task.clone())).await.unwrap();
        while h.llm.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // A restarted orchestrator subscribes and re-publishes the turn.
        let mut stream = results.subscribe().await.unwrap();
        inbox.publish(&Envelope::Task(task.clone())).await.unwrap();

        let Some(Envelope::Result(result)) = stream.next().await else {
            panic!("expected a result envelope");
        };
        assert_eq!(result.correlation_id, task.correlation_id);
        assert_eq!(result.content, "I will carry it");
        assert_eq!(h.llm.calls.load(Ordering::SeqCst), 1);

        h.shutdown.send(true).unwrap();
        h.handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn exhausted_retries_report_generation_failed() {
        let h = spawn_runtime(StaticAdapter::failing()).await;

        let results = h.bus.channel(&SubjectPatterns::workflow_results("wf-1"));
        let mut stream = results.subscribe().await.unwrap();

        let task = TaskEnvelope::new("wf-1", 0, "Frodo", "Speak");
        h.bus
            .channel(&SubjectPatterns::agent_tasks("Frodo"))
            .publish(&Envelope::Task(task.clone()))
            .await
            .unwrap();

        let Some(Envelope::Result(result)) = stream.next().await else {
            panic!("expected a result envelope");
        };
        assert_eq!(result.correlation_id, task.correlation_id);
        assert!(matches!(
            result.error,
            Some(TaskError::GenerationFailed { .. })
        ));

        h.shutdown.send(true).unwrap();
        h.handle.await.unwrap().unwrap();
    }

    fn cached_result(turn: u64) -> ResultEnvelope {
        let task = TaskEnvelope::new("wf-1", turn, "Frodo", "Speak");
        ResultEnvelope::ok(&task, "Frodo", "spoken")
    }

    #[test]
    fn recent_results_evict_oldest() {
        let mut recent = RecentResults::new(2);
        let a = cached_result(0);
        let b = cached_result(1);
        let c = cached_result(2);

        recent.insert(a.clone());
        recent.insert(b.clone());
        assert!(recent.get(&a.correlation_id).is_some());

        recent.insert(c.clone()); // evicts the oldest
        assert!(recent.get(&a.correlation_id).is_none());
        assert!(recent.get(&b.correlation_id).is_some());
        assert!(recent.get(&c.correlation_id).is_some());
    }

    #[test]
    fn workflow_contexts_evict_least_recently_used() {
        let mut contexts = WorkflowContexts::new(2);
        contexts.entry("wf-1").push(LLMMessage::user("a"));
        contexts.entry("wf-2").push(LLMMessage::user("b"));
        contexts.entry("wf-1"); // promote

        contexts.entry("wf-3").push(LLMMessage::user("c"));

        assert!(contexts.entries.contains_key("wf-1"));
        assert!(!contexts.entries.contains_key("wf-2"));
        assert!(contexts.entries.contains_key("wf-3"));
        assert_eq!(contexts.entry("wf-1").len(), 1);
    }
}
