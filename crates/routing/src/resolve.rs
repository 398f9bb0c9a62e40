use std::{fmt, sync::Arc};

use {
    lexlinker_agents::{AgentVariant, ChatMessage, Slot, VariantRegistry},
    lexlinker_sessions::{Message, Role},
    serde_json::{Map, Value},
    tracing::{debug, info, warn},
};

use crate::{classifier::Classifier, slots::SlotDetector};

/// Metadata key holding the [`RoutingState`] of a conversation.
pub const ROUTING_STATE_KEY: &str = "routing_state";
/// Metadata key holding the variant the classifier last asked for.
pub const REQUESTED_VARIANT_KEY: &str = "requested_variant";

/// Per-conversation routing state. A clarification turn always replies, so
/// `AwaitingClarification` is re-entered on the next message, never stuck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingState {
    New,
    AwaitingClarification,
    Routed,
}

impl RoutingState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::AwaitingClarification => "awaiting_clarification",
            Self::Routed => "routed",
        }
    }
}

impl fmt::Display for RoutingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`Router::select`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Hand the turn to this variant.
    Variant(AgentVariant),
    /// `requested` needs slots the user has not supplied yet.
    Clarification {
        requested: AgentVariant,
        missing: Vec<Slot>,
    },
}

impl RouteDecision {
    #[must_use]
    pub fn state(&self) -> RoutingState {
        match self {
            Self::Variant(_) => RoutingState::Routed,
            Self::Clarification { .. } => RoutingState::AwaitingClarification,
        }
    }

    /// The variant the classifier settled on, even when clarification wins.
    #[must_use]
    pub fn requested(&self) -> &AgentVariant {
        match self {
            Self::Variant(variant) => variant,
            Self::Clarification { requested, .. } => requested,
        }
    }

    /// Deterministic reply for a clarification turn.
    #[must_use]
    pub fn clarification_text(&self) -> Option<String> {
        match self {
            Self::Variant(_) => None,
            Self::Clarification { requested, missing } => {
                Some(clarification_text(requested, missing))
            },
        }
    }

    /// Diagnostic entries merged into the record metadata.
    #[must_use]
    pub fn metadata(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(ROUTING_STATE_KEY.into(), self.state().as_str().into());
        map.insert(
            REQUESTED_VARIANT_KEY.into(),
            self.requested().name.clone().into(),
        );
        map
    }
}

/// Ask for `missing` slots, in order, on behalf of `requested`.
#[must_use]
pub fn clarification_text(requested: &AgentVariant, missing: &[Slot]) -> String {
    let mut out = clarification_intro(requested);
    for slot in missing {
        out.push_str("\n- ");
        out.push_str(slot.describe());
    }
    out.push_str("\nPlease send them in your next message.");
    out
}

fn clarification_intro(requested: &AgentVariant) -> String {
    format!(
        "Before our {} specialist can help, I need a few more details:",
        requested.name
    )
}

/// Whether an assistant message in `history` already asked for `requested`'s
/// slots.
fn asked_for_slots(history: &[Message], requested: &AgentVariant) -> bool {
    let intro = clarification_intro(requested);
    history
        .iter()
        .any(|m| m.role == Role::Assistant && m.content.starts_with(&intro))
}

/// Chooses a variant per message and gates hand-off on required slots.
pub struct Router {
    registry: Arc<VariantRegistry>,
    classifier: Arc<dyn Classifier>,
    slots: SlotDetector,
}

impl Router {
    pub fn new(
        registry: Arc<VariantRegistry>,
        classifier: Arc<dyn Classifier>,
        slots: SlotDetector,
    ) -> Self {
        Self {
            registry,
            classifier,
            slots,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &VariantRegistry {
        &self.registry
    }

    /// Pick a variant for `message` given the stored `history`.
    ///
    /// Never fails: classifier errors and unknown names fall back to the
    /// default variant. Slot gating only looks at user-authored text.
    pub async fn select(&self, history: &[Message], message: &str) -> RouteDecision {
        let mut convo: Vec<ChatMessage> = history.iter().map(ChatMessage::from).collect();
        let current_is_last = history
            .last()
            .is_some_and(|m| m.role == Role::User && m.content == message);
        if !current_is_last {
            convo.push(ChatMessage::user(message));
        }

        let variant = match self.classifier.classify(&convo).await {
            Ok(name) => match self.registry.get(&name) {
                Some(variant) => variant,
                None => {
                    warn!(name = %name, "classifier returned unknown variant, using default");
                    self.registry.default_variant()
                },
            },
            Err(e) => {
                warn!(error = %e, "classifier failed, using default variant");
                self.registry.default_variant()
            },
        };

        let decision = if variant.required_slots.is_empty() {
            RouteDecision::Variant(variant.clone())
        } else {
            let mut texts: Vec<&str> = history
                .iter()
                .filter(|m| m.role == Role::User)
                .map(|m| m.content.as_str())
                .collect();
            if current_is_last {
                texts.pop();
            }
            let missing_before = self.slots.missing(&variant.required_slots, &texts);
            texts.push(message);
            let missing = self.slots.missing(&variant.required_slots, &texts);
            if missing.is_empty() {
                RouteDecision::Variant(variant.clone())
            } else if missing.len() == missing_before.len() && asked_for_slots(history, variant) {
                // Already asked and this message adds nothing: the user moved
                // on, so one unanswered round releases the conversation.
                info!(
                    requested = %variant.name,
                    "clarification left unanswered, using default variant"
                );
                RouteDecision::Variant(self.registry.default_variant().clone())
            } else {
                debug!(variant = %variant.name, ?missing, "required slots missing");
                RouteDecision::Clarification {
                    requested: variant.clone(),
                    missing,
                }
            }
        };

        info!(
            variant = %decision.requested().name,
            state = %decision.state(),
            history_len = history.len(),
            "route selected"
        );
        decision
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::{Error, Result, classifier::KeywordClassifier},
        async_trait::async_trait,
        lexlinker_agents::variant::{CONTRACT_VARIANT, GENERAL_VARIANT, RESEARCH_VARIANT},
    };

    struct Fixed(&'static str);

    #[async_trait]
    impl Classifier for Fixed {
        async fn classify(&self, _messages: &[ChatMessage]) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Broken;

    #[async_trait]
    impl Classifier for Broken {
        async fn classify(&self, _messages: &[ChatMessage]) -> Result<String> {
            Err(Error::Classifier(lexlinker_agents::Error::invalid_invocation(
                "oracle offline",
            )))
        }
    }

    fn router(classifier: Arc<dyn Classifier>) -> Router {
        Router::new(
            Arc::new(VariantRegistry::builtin()),
            classifier,
            SlotDetector::builtin().unwrap(),
        )
    }

    fn user(content: &str) -> Message {
        Message {
            role: Role::User,
            content: content.into(),
            timestamp: 1,
        }
    }

    fn assistant(content: &str) -> Message {
        Message {
            role: Role::Assistant,
            content: content.into(),
            timestamp: 2,
        }
    }

    #[tokio::test]
    async fn unknown_name_falls_back_to_default() {
        let decision = router(Arc::new(Fixed("astrology"))).select(&[], "hi").await;
        assert_eq!(decision.requested().name, GENERAL_VARIANT);
        assert_eq!(decision.state(), RoutingState::Routed);
    }

    #[tokio::test]
    async fn classifier_error_falls_back_to_default() {
        let decision = router(Arc::new(Broken)).select(&[], "hi").await;
        assert_eq!(decision, RouteDecision::Variant(AgentVariant::general()));
    }

    #[tokio::test]
    async fn variant_without_slots_routes_directly() {
        let decision = router(Arc::new(Fixed(RESEARCH_VARIANT)))
            .select(&[], "anything new?")
            .await;
        assert_eq!(decision.requested().name, RESEARCH_VARIANT);
        assert!(decision.clarification_text().is_none());
    }

    #[tokio::test]
    async fn contract_without_details_asks_for_clarification() {
        let history = vec![user("I need a contract")];
        let decision = router(Arc::new(Fixed(CONTRACT_VARIANT)))
            .select(&history, "I need a contract")
            .await;

        let RouteDecision::Clarification { requested, missing } = &decision else {
            panic!("expected clarification, got {decision:?}");
        };
        assert_eq!(requested.name, CONTRACT_VARIANT);
        assert_eq!(missing, &vec![Slot::Parties, Slot::Term, Slot::KeyConditions]);
        assert_eq!(decision.state(), RoutingState::AwaitingClarification);

        let text = decision.clarification_text().unwrap();
        assert!(text.starts_with("Before our contract specialist can help"));
        assert!(text.contains(Slot::Parties.describe()));
    }

    #[tokio::test]
    async fn complete_contract_request_routes_to_contract() {
        let msg = "I need a rental contract for 2 rooms, 12 months, parties X and Y";
        let history = vec![user("Hello"), assistant("Hi!"), user(msg)];
        let decision = router(Arc::new(KeywordClassifier::builtin().unwrap()))
            .select(&history, msg)
            .await;
        assert_eq!(decision, RouteDecision::Variant(AgentVariant::contract()));
    }

    #[tokio::test]
    async fn clarification_is_satisfied_by_a_later_answer() {
        let history = vec![
            user("I need a lease contract"),
            assistant("Before our contract specialist can help, who are the parties?"),
            user("Between Ana and Luis, 12 months, rent 5000 pesos"),
        ];
        let decision = router(Arc::new(KeywordClassifier::builtin().unwrap()))
            .select(&history, "Between Ana and Luis, 12 months, rent 5000 pesos")
            .await;
        assert_eq!(decision.state(), RoutingState::Routed);
        assert_eq!(decision.requested().name, CONTRACT_VARIANT);
    }

    #[tokio::test]
    async fn assistant_text_never_satisfies_slots() {
        let history = vec![
            assistant("The parties must agree on a 12 months term and the rent."),
            user("I need a contract"),
        ];
        let decision = router(Arc::new(Fixed(CONTRACT_VARIANT)))
            .select(&history, "I need a contract")
            .await;
        assert_eq!(decision.state(), RoutingState::AwaitingClarification);
    }

    #[tokio::test]
    async fn message_missing_from_history_is_still_considered() {
        let decision = router(Arc::new(Fixed(CONTRACT_VARIANT)))
            .select(&[], "contract between X and Y for 12 months, rent $500")
            .await;
        assert_eq!(decision.state(), RoutingState::Routed);
    }

    #[test]
    fn clarification_text_is_deterministic() {
        let a = clarification_text(&AgentVariant::contract(), &[Slot::Term]);
        let b = clarification_text(&AgentVariant::contract(), &[Slot::Term]);
        assert_eq!(a, b);
        assert_eq!(
            a,
            "Before our contract specialist can help, I need a few more details:\n- the \
             duration or term of the agreement\nPlease send them in your next message."
        );
    }

    #[test]
    fn decision_metadata_records_state() {
        let decision = RouteDecision::Clarification {
            requested: AgentVariant::contract(),
            missing: vec![Slot::Parties],
        };
        let meta = decision.metadata();
        assert_eq!(meta[ROUTING_STATE_KEY], "awaiting_clarification");
        assert_eq!(meta[REQUESTED_VARIANT_KEY], "contract");
    }

    fn contract_clarification() -> Message {
        assistant(&clarification_text(&AgentVariant::contract(), &Slot::ALL))
    }

    #[tokio::test]
    async fn unanswered_clarification_releases_to_default() {
        let history = vec![
            user("I need a contract"),
            contract_clarification(),
            user("Hello"),
        ];
        let decision = router(Arc::new(KeywordClassifier::builtin().unwrap()))
            .select(&history, "Hello")
            .await;
        assert_eq!(decision, RouteDecision::Variant(AgentVariant::general()));
    }

    #[tokio::test]
    async fn partial_answer_keeps_asking_for_the_rest() {
        let history = vec![
            user("I need a contract"),
            contract_clarification(),
            user("between Ana and Luis"),
        ];
        let decision = router(Arc::new(KeywordClassifier::builtin().unwrap()))
            .select(&history, "between Ana and Luis")
            .await;
        let RouteDecision::Clarification { missing, .. } = &decision else {
            panic!("expected clarification, got {decision:?}");
        };
        assert_eq!(missing, &vec![Slot::Term, Slot::KeyConditions]);
    }

    #[tokio::test]
    async fn conversation_is_not_stuck_after_a_clarification() {
        let router = router(Arc::new(KeywordClassifier::builtin().unwrap()));
        let mut history = vec![user("I need a contract"), contract_clarification()];
        for text in ["never mind, thanks", "ok bye", "Hello?"] {
            history.push(user(text));
            let decision = router.select(&history, text).await;
            assert_eq!(decision.state(), RoutingState::Routed, "{text}");
            assert_eq!(decision.requested().name, GENERAL_VARIANT);
            history.push(assistant("[general] answer"));
        }
    }
}
