//! The request/response pipeline: store, route, invoke, persist.

use std::{sync::Arc, time::Instant};

use {
    lexlinker_agents::{
        BackoffCaller, Guardrail, NoopGuardrail, Outcome, build_model_input,
        prompt::{self, EMPTY_INPUT_REPLY, INPUT_REFUSAL},
        retry::PERMANENT_FAILURE_FALLBACK,
    },
    lexlinker_routing::{RouteDecision, Router},
    lexlinker_sessions::{ConversationIdentity, HistoryStore, Message, Role},
    tokio::task::JoinHandle,
    tracing::{debug, error, info, trace, warn},
};

use crate::{Result, locks::IdentityLocks};

/// How a turn's reply was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnKind {
    /// Empty text or an unusable identity; nothing was stored.
    Rejected,
    /// The input guardrail tripped.
    Refused,
    /// A required-slot clarification, no engine call.
    Clarification { requested: String },
    /// The engine was invoked for `variant`.
    Agent { variant: String, outcome: Outcome },
}

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct Turn {
    pub reply: String,
    pub kind: TurnKind,
}

impl Turn {
    fn rejected() -> Self {
        Self {
            reply: EMPTY_INPUT_REPLY.to_string(),
            kind: TurnKind::Rejected,
        }
    }
}

/// Composes the history store, router and backoff caller.
///
/// Cheap to clone; every collaborator is shared.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn HistoryStore>,
    router: Arc<Router>,
    caller: BackoffCaller,
    input_guardrail: Arc<dyn Guardrail>,
    output_guardrail: Arc<dyn Guardrail>,
    preamble: String,
    locks: IdentityLocks,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn HistoryStore>, router: Arc<Router>, caller: BackoffCaller) -> Self {
        Self {
            store,
            router,
            caller,
            input_guardrail: Arc::new(NoopGuardrail),
            output_guardrail: Arc::new(NoopGuardrail),
            preamble: prompt::SYSTEM_PREAMBLE.to_string(),
            locks: IdentityLocks::new(),
        }
    }

    #[must_use]
    pub fn with_guardrails(
        mut self,
        input: Arc<dyn Guardrail>,
        output: Arc<dyn Guardrail>,
    ) -> Self {
        self.input_guardrail = input;
        self.output_guardrail = output;
        self
    }

    #[must_use]
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// Drop the conversation for `identity`, waiting for any turn in flight.
    pub async fn clear(&self, identity: &ConversationIdentity) -> lexlinker_sessions::Result<()> {
        let _guard = self.locks.acquire(identity).await;
        self.store.clear(identity).await?;
        info!(identity = %identity, "conversation cleared");
        Ok(())
    }

    /// Run one turn and return the reply text.
    pub async fn process(&self, raw_identity: &str, inbound_text: &str) -> String {
        self.process_turn(raw_identity, inbound_text).await.reply
    }

    /// Run `process_turn` on a detached task so that dropping the caller
    /// (for example an abandoned HTTP request) does not cancel the pipeline.
    pub fn spawn(&self, raw_identity: String, inbound_text: String) -> JoinHandle<Turn> {
        let this = self.clone();
        tokio::spawn(async move { this.process_turn(&raw_identity, &inbound_text).await })
    }

    /// [`Self::spawn`] and wait for the result.
    pub async fn run_detached(&self, raw_identity: String, inbound_text: String) -> Result<Turn> {
        Ok(self.spawn(raw_identity, inbound_text).await?)
    }

    pub async fn process_turn(&self, raw_identity: &str, inbound_text: &str) -> Turn {
        let text = inbound_text.trim();
        if text.is_empty() {
            debug!("empty inbound text, asking for more");
            return Turn::rejected();
        }
        let identity = match ConversationIdentity::parse(raw_identity) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "unusable identity, asking for more");
                return Turn::rejected();
            },
        };

        let started = Instant::now();
        let _guard = self.locks.acquire(&identity).await;

        let stored_user = match self.store.append(&identity, Role::User, text).await {
            Ok(_) => true,
            Err(e) => {
                warn!(identity = %identity, error = %e, "failed to store user message");
                false
            },
        };
        let history = self.load_history(&identity, text, stored_user).await;
        trace!(identity = %identity, history_len = history.len(), "history loaded");

        let turn = self.respond(&identity, text, &history).await;

        // Records are only created by inbound messages; a reply without its
        // user message would break the user/assistant alternation.
        if !stored_user {
            warn!(identity = %identity, "user message not stored, skipping assistant reply");
        } else if let Err(e) = self
            .store
            .append(&identity, Role::Assistant, &turn.reply)
            .await
        {
            warn!(identity = %identity, error = %e, "failed to store assistant reply");
        }

        info!(
            identity = %identity,
            kind = ?turn.kind,
            reply_len = turn.reply.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "turn complete"
        );
        turn
    }

    /// Stored history, falling back to empty when the store is unreachable.
    /// The current message is always the last entry.
    async fn load_history(
        &self,
        identity: &ConversationIdentity,
        text: &str,
        stored_user: bool,
    ) -> Vec<Message> {
        let mut history = match self.store.get_history(identity).await {
            Ok(history) => history,
            Err(e) => {
                warn!(identity = %identity, error = %e, "history unavailable, continuing without context");
                Vec::new()
            },
        };
        let current_is_last = history
            .last()
            .is_some_and(|m| m.role == Role::User && m.content == text);
        if !stored_user || !current_is_last {
            history.push(Message {
                role: Role::User,
                content: text.to_string(),
                timestamp: 0,
            });
        }
        history
    }

    async fn respond(&self, identity: &ConversationIdentity, text: &str, history: &[Message]) -> Turn {
        match self.input_guardrail.check(text).await {
            Ok(verdict) if verdict.tripwire_triggered => {
                info!(
                    identity = %identity,
                    guardrail = self.input_guardrail.name(),
                    reason = %verdict.reason,
                    "input guardrail tripped"
                );
                return Turn {
                    reply: INPUT_REFUSAL.to_string(),
                    kind: TurnKind::Refused,
                };
            },
            Ok(_) => {},
            Err(e) => {
                warn!(guardrail = self.input_guardrail.name(), error = %e, "input guardrail failed, passing");
            },
        }

        let decision = self.router.select(history, text).await;
        if let Err(e) = self
            .store
            .update_metadata(identity, decision.metadata())
            .await
        {
            warn!(identity = %identity, error = %e, "failed to record routing state");
        }

        let variant = match decision {
            RouteDecision::Clarification { ref requested, .. } => {
                let reply = decision.clarification_text().unwrap_or_default();
                return Turn {
                    reply,
                    kind: TurnKind::Clarification {
                        requested: requested.name.clone(),
                    },
                };
            },
            RouteDecision::Variant(variant) => variant,
        };

        if let Err(e) = self
            .store
            .set_current_variant(identity, &variant.name)
            .await
        {
            warn!(identity = %identity, error = %e, "failed to record current variant");
        }

        let input = build_model_input(&self.preamble, history);
        let (mut reply, outcome) = match self.caller.invoke_detailed(&variant, &input).await {
            Ok(inv) => (inv.reply, inv.outcome),
            Err(e) => {
                error!(identity = %identity, variant = %variant.name, error = %e, "agent invocation rejected");
                (PERMANENT_FAILURE_FALLBACK.to_string(), Outcome::Permanent)
            },
        };

        if outcome == Outcome::Success {
            match self.output_guardrail.check(&reply).await {
                Ok(verdict) if verdict.tripwire_triggered => {
                    debug!(
                        identity = %identity,
                        reason = %verdict.reason,
                        "output guardrail tripped, adding disclaimer"
                    );
                    reply = prompt::with_disclaimer(&reply);
                },
                Ok(_) => {},
                Err(e) => {
                    warn!(guardrail = self.output_guardrail.name(), error = %e, "output guardrail failed, passing");
                },
            }
        }

        Turn {
            reply,
            kind: TurnKind::Agent {
                variant: variant.name,
                outcome,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        async_trait::async_trait,
        lexlinker_agents::{
            AgentExecutor, AgentVariant, ChatMessage, ExecutionError, GuardrailVerdict,
            RetryPolicy, VariantRegistry,
        },
        lexlinker_routing::{KeywordClassifier, SlotDetector},
        lexlinker_sessions::{ConversationRecord, JsonlHistoryStore},
        serde_json::{Map, Value},
        std::{sync::Mutex, time::Duration},
    };

    /// Echoes the variant name and records every call.
    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<(String, Vec<ChatMessage>)>>,
    }

    #[async_trait]
    impl AgentExecutor for RecordingExecutor {
        fn id(&self) -> &str {
            "recording"
        }

        async fn run(
            &self,
            variant: &AgentVariant,
            messages: &[ChatMessage],
        ) -> std::result::Result<String, ExecutionError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.calls
                .lock()
                .unwrap()
                .push((variant.name.clone(), messages.to_vec()));
            Ok(format!("[{}] answer", variant.name))
        }
    }

    struct Tripwire;

    #[async_trait]
    impl Guardrail for Tripwire {
        fn name(&self) -> &str {
            "tripwire"
        }

        async fn check(&self, _text: &str) -> lexlinker_agents::Result<GuardrailVerdict> {
            Ok(GuardrailVerdict::trip("test"))
        }
    }

    /// Every operation fails as if the backend were down.
    struct DownStore;

    fn down() -> lexlinker_sessions::Error {
        lexlinker_sessions::Error::unavailable("backend down")
    }

    #[async_trait]
    impl HistoryStore for DownStore {
        fn history_limit(&self) -> usize {
            20
        }

        async fn append(
            &self,
            _: &ConversationIdentity,
            _: Role,
            _: &str,
        ) -> lexlinker_sessions::Result<Message> {
            Err(down())
        }

        async fn get_recent(
            &self,
            _: &ConversationIdentity,
            _: usize,
        ) -> lexlinker_sessions::Result<Vec<Message>> {
            Err(down())
        }

        async fn clear(&self, _: &ConversationIdentity) -> lexlinker_sessions::Result<()> {
            Err(down())
        }

        async fn record(
            &self,
            _: &ConversationIdentity,
        ) -> lexlinker_sessions::Result<Option<ConversationRecord>> {
            Err(down())
        }

        async fn set_current_variant(
            &self,
            _: &ConversationIdentity,
            _: &str,
        ) -> lexlinker_sessions::Result<()> {
            Err(down())
        }

        async fn update_metadata(
            &self,
            _: &ConversationIdentity,
            _: Map<String, Value>,
        ) -> lexlinker_sessions::Result<()> {
            Err(down())
        }

        async fn list_identities(&self) -> lexlinker_sessions::Result<Vec<ConversationIdentity>> {
            Err(down())
        }
    }

    /// Rejects user appends and forwards everything else, as if the backend
    /// recovered right after the inbound write failed.
    struct UserAppendFails(Arc<JsonlHistoryStore>);

    #[async_trait]
    impl HistoryStore for UserAppendFails {
        fn history_limit(&self) -> usize {
            self.0.history_limit()
        }

        async fn append(
            &self,
            identity: &ConversationIdentity,
            role: Role,
            content: &str,
        ) -> lexlinker_sessions::Result<Message> {
            if role == Role::User {
                return Err(down());
            }
            self.0.append(identity, role, content).await
        }

        async fn get_recent(
            &self,
            identity: &ConversationIdentity,
            limit: usize,
        ) -> lexlinker_sessions::Result<Vec<Message>> {
            self.0.get_recent(identity, limit).await
        }

        async fn clear(&self, identity: &ConversationIdentity) -> lexlinker_sessions::Result<()> {
            self.0.clear(identity).await
        }

        async fn record(
            &self,
            identity: &ConversationIdentity,
        ) -> lexlinker_sessions::Result<Option<ConversationRecord>> {
            self.0.record(identity).await
        }

        async fn set_current_variant(
            &self,
            identity: &ConversationIdentity,
            variant: &str,
        ) -> lexlinker_sessions::Result<()> {
            self.0.set_current_variant(identity, variant).await
        }

        async fn update_metadata(
            &self,
            identity: &ConversationIdentity,
            entries: Map<String, Value>,
        ) -> lexlinker_sessions::Result<()> {
            self.0.update_metadata(identity, entries).await
        }

        async fn list_identities(&self) -> lexlinker_sessions::Result<Vec<ConversationIdentity>> {
            self.0.list_identities().await
        }
    }

    fn orchestrator(
        store: Arc<dyn HistoryStore>,
        executor: Arc<RecordingExecutor>,
    ) -> Orchestrator {
        let router = Router::new(
            Arc::new(VariantRegistry::builtin()),
            Arc::new(KeywordClassifier::builtin().unwrap()),
            SlotDetector::builtin().unwrap(),
        );
        let caller = BackoffCaller::new(executor, RetryPolicy::default());
        Orchestrator::new(store, Arc::new(router), caller)
    }

    fn temp_store() -> (Arc<JsonlHistoryStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (
            Arc::new(JsonlHistoryStore::new(dir.path().to_path_buf(), 20)),
            dir,
        )
    }

    fn id(raw: &str) -> ConversationIdentity {
        ConversationIdentity::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn empty_input_is_rejected_without_mutation() {
        let (store, dir) = temp_store();
        let exec = Arc::new(RecordingExecutor::default());
        let orch = orchestrator(store, Arc::clone(&exec));

        assert_eq!(orch.process("A", "   ").await, EMPTY_INPUT_REPLY);
        assert_eq!(orch.process("whatsapp:", "hi").await, EMPTY_INPUT_REPLY);
        assert!(exec.calls.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn model_input_is_preamble_then_history() {
        let (store, _dir) = temp_store();
        let exec = Arc::new(RecordingExecutor::default());
        let orch = orchestrator(store, Arc::clone(&exec));

        orch.process("A", "Hello").await;
        orch.process("A", "What are my rights?").await;

        let calls = exec.calls.lock().unwrap();
        let (_, input) = &calls[1];
        assert_eq!(input[0], ChatMessage::system(prompt::SYSTEM_PREAMBLE));
        assert_eq!(input[1], ChatMessage::user("Hello"));
        assert_eq!(input[2], ChatMessage::assistant("[general] answer"));
        assert_eq!(input[3], ChatMessage::user("What are my rights?"));
        assert_eq!(input.len(), 4);
    }

    #[tokio::test]
    async fn contract_without_details_is_clarified_without_engine_call() {
        let (store, _dir) = temp_store();
        let exec = Arc::new(RecordingExecutor::default());
        let orch = orchestrator(store.clone(), Arc::clone(&exec));

        let turn = orch.process_turn("A", "I need a contract").await;

        assert_eq!(turn.kind, TurnKind::Clarification {
            requested: "contract".into()
        });
        assert!(exec.calls.lock().unwrap().is_empty());
        let record = store.record(&id("A")).await.unwrap().unwrap();
        assert!(record.current_agent_variant.is_none());
        assert_eq!(record.metadata["routing_state"], "awaiting_clarification");
        assert_eq!(record.conversation_history.len(), 2);
        assert_eq!(record.conversation_history[1].content, turn.reply);
    }

    #[tokio::test]
    async fn specialist_route_updates_current_variant() {
        let (store, _dir) = temp_store();
        let exec = Arc::new(RecordingExecutor::default());
        let orch = orchestrator(store.clone(), Arc::clone(&exec));

        orch.process("A", "I need a contract").await;
        let turn = orch
            .process_turn("A", "Between Ana and Luis, 12 months, rent 5000 pesos")
            .await;

        assert_eq!(turn.reply, "[contract] answer");
        let record = store.record(&id("A")).await.unwrap().unwrap();
        assert_eq!(record.current_agent_variant.as_deref(), Some("contract"));
        assert_eq!(record.metadata["routing_state"], "routed");
    }

    #[tokio::test]
    async fn input_tripwire_refuses_without_engine_call() {
        let (store, _dir) = temp_store();
        let exec = Arc::new(RecordingExecutor::default());
        let orch = orchestrator(store.clone(), Arc::clone(&exec))
            .with_guardrails(Arc::new(Tripwire), Arc::new(NoopGuardrail));

        let turn = orch.process_turn("A", "something rude").await;

        assert_eq!(turn.kind, TurnKind::Refused);
        assert_eq!(turn.reply, INPUT_REFUSAL);
        assert!(exec.calls.lock().unwrap().is_empty());
        assert_eq!(store.get_history(&id("A")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn output_tripwire_appends_disclaimer() {
        let (store, _dir) = temp_store();
        let exec = Arc::new(RecordingExecutor::default());
        let orch = orchestrator(store, Arc::clone(&exec))
            .with_guardrails(Arc::new(NoopGuardrail), Arc::new(Tripwire));

        let reply = orch.process("A", "What are my rights?").await;
        assert!(reply.starts_with("[general] answer"));
        assert!(reply.ends_with(prompt::LEGAL_DISCLAIMER));
    }

    #[tokio::test]
    async fn store_outage_still_produces_a_reply() {
        let exec = Arc::new(RecordingExecutor::default());
        let orch = orchestrator(Arc::new(DownStore), Arc::clone(&exec));

        let reply = orch.process("A", "What are my rights?").await;

        assert_eq!(reply, "[general] answer");
        let calls = exec.calls.lock().unwrap();
        let (_, input) = &calls[0];
        assert_eq!(input.last(), Some(&ChatMessage::user("What are my rights?")));
        assert_eq!(input.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_turns_for_one_identity_alternate() {
        let (store, _dir) = temp_store();
        let exec = Arc::new(RecordingExecutor::default());
        let orch = orchestrator(store.clone(), Arc::clone(&exec));

        let handles: Vec<_> = (0..5)
            .map(|i| orch.spawn("A".into(), format!("question {i}")))
            .collect();
        for h in handles {
            h.await.unwrap();
        }

        let history = store.get_history(&id("A")).await.unwrap();
        assert_eq!(history.len(), 10);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
        }
    }

    #[tokio::test]
    async fn detached_run_completes_when_caller_drops_handle() {
        let (store, _dir) = temp_store();
        let exec = Arc::new(RecordingExecutor::default());
        let orch = orchestrator(store.clone(), Arc::clone(&exec));

        drop(orch.spawn("A".into(), "Hello".into()));
        // A second turn queues behind the first on the identity lock.
        orch.run_detached("A".into(), "Hello again".into())
            .await
            .unwrap();

        let history = store.get_history(&id("A")).await.unwrap();
        assert_eq!(history.len(), 4);
    }

    #[tokio::test]
    async fn clear_removes_conversation() {
        let (store, _dir) = temp_store();
        let exec = Arc::new(RecordingExecutor::default());
        let orch = orchestrator(store.clone(), Arc::clone(&exec));

        orch.process("A", "Hello").await;
        orch.clear(&id("A")).await.unwrap();

        assert!(store.record(&id("A")).await.unwrap().is_none());
        assert!(store.get_history(&id("A")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reply_is_not_stored_when_user_message_was_lost() {
        let (inner, _dir) = temp_store();
        let exec = Arc::new(RecordingExecutor::default());
        let orch = orchestrator(
            Arc::new(UserAppendFails(Arc::clone(&inner))),
            Arc::clone(&exec),
        );

        let reply = orch.process("A", "What are my rights?").await;

        assert_eq!(reply, "[general] answer");
        assert_eq!(exec.calls.lock().unwrap().len(), 1);
        assert!(inner.record(&id("A")).await.unwrap().is_none());
    }
}
