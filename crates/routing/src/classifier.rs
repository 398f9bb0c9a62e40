//! Classification oracles: map a conversation to a variant name.

use std::sync::Arc;

use {
    async_trait::async_trait,
    lexlinker_agents::{
        AgentExecutor, AgentVariant, ChatMessage, VariantRegistry, prompt,
        variant::{CONTRACT_VARIANT, GENERAL_VARIANT, RESEARCH_VARIANT},
    },
    regex::Regex,
    tracing::debug,
};

use crate::Result;

/// Returns a variant name for the conversation. The name is not trusted:
/// the router validates it against the registry.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Deterministic keyword scoring.
///
/// Keywords match whole words only, case-insensitively. Scores the newest
/// user message first; when nothing matches it walks back through older user
/// messages, newest first. No match at all yields the default name.
pub struct KeywordClassifier {
    rules: Vec<(String, Vec<Regex>)>,
    default: String,
}

impl KeywordClassifier {
    /// `rules` pairs a variant name with its keywords. Earlier rules win ties.
    pub fn new(rules: Vec<(String, Vec<String>)>, default: impl Into<String>) -> Result<Self> {
        let rules = rules
            .into_iter()
            .map(|(name, words)| {
                let patterns = words
                    .iter()
                    .map(|w| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(w.trim()))))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok((name, patterns))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            rules,
            default: default.into(),
        })
    }

    /// Keywords for the built-in contract, research and general variants.
    pub fn builtin() -> Result<Self> {
        let rule = |name: &str, words: &[&str]| -> (String, Vec<String>) {
            (
                name.to_string(),
                words.iter().map(|w| (*w).to_string()).collect(),
            )
        };
        Self::new(
            vec![
                rule(CONTRACT_VARIANT, &[
                    "contract",
                    "agreement",
                    "lease",
                    "draft a",
                    "contract review",
                    "contrato",
                    "convenio",
                    "arrendamiento",
                ]),
                rule(RESEARCH_VARIANT, &[
                    "research",
                    "recent changes",
                    "current information",
                    "citation",
                    "latest",
                    "reform",
                    "new law",
                    "jurisprudencia",
                    "reforma",
                ]),
                rule(GENERAL_VARIANT, &[
                    "legal advice",
                    "legal guidance",
                    "rights",
                    "obligations",
                    "legal proceedings",
                    "lawsuit",
                    "derechos",
                    "demanda",
                ]),
            ],
            GENERAL_VARIANT,
        )
    }

    /// The rule with the most distinct keyword hits in `text`.
    #[must_use]
    pub fn score(&self, text: &str) -> Option<&str> {
        let mut best: Option<(&str, usize)> = None;
        for (name, patterns) in &self.rules {
            let hits = patterns.iter().filter(|p| p.is_match(text)).count();
            if hits > 0 && best.is_none_or(|(_, top)| hits > top) {
                best = Some((name.as_str(), hits));
            }
        }
        best.map(|(name, _)| name)
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, messages: &[ChatMessage]) -> Result<String> {
        let choice = messages
            .iter()
            .rev()
            .filter(|m| matches!(m, ChatMessage::User { .. }))
            .find_map(|m| self.score(m.content()))
            .unwrap_or(self.default.as_str());
        Ok(choice.to_string())
    }
}

/// Asks the execution engine with the triage prompt.
pub struct ModelClassifier {
    executor: Arc<dyn AgentExecutor>,
    triage: AgentVariant,
}

impl ModelClassifier {
    pub fn new(
        executor: Arc<dyn AgentExecutor>,
        registry: &VariantRegistry,
        model: Option<String>,
    ) -> Self {
        let triage = AgentVariant::new("triage", "routing")
            .with_instructions(prompt::triage_prompt(registry))
            .with_model(model);
        Self { executor, triage }
    }
}

/// Reduce a free-form model answer to a bare variant name.
fn clean_name(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '_' && c != '-')
        .to_lowercase()
}

#[async_trait]
impl Classifier for ModelClassifier {
    async fn classify(&self, messages: &[ChatMessage]) -> Result<String> {
        let convo: Vec<ChatMessage> = messages
            .iter()
            .filter(|m| !matches!(m, ChatMessage::System { .. }))
            .cloned()
            .collect();
        let raw = self
            .executor
            .run(&self.triage, &convo)
            .await
            .map_err(lexlinker_agents::Error::from)?;
        let name = clean_name(&raw);
        debug!(raw_len = raw.len(), name = %name, "model classifier answered");
        Ok(name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, lexlinker_agents::ExecutionError, rstest::rstest};

    #[rstest]
    #[case("I need a rental contract for 2 rooms", CONTRACT_VARIANT)]
    #[case("¿Me ayudas con un contrato de arrendamiento?", CONTRACT_VARIANT)]
    #[case("What are the recent changes to labor law?", RESEARCH_VARIANT)]
    #[case("What are my rights as a tenant?", GENERAL_VARIANT)]
    #[case("Hello", GENERAL_VARIANT)]
    #[case("please help", GENERAL_VARIANT)]
    #[case("Can you please explain my rights?", GENERAL_VARIANT)]
    #[case("a long answer please", GENERAL_VARIANT)]
    #[case("Who owns the copyrights?", GENERAL_VARIANT)]
    #[case("I want to release my band's album", GENERAL_VARIANT)]
    #[case("Please draft a LEASE for me", CONTRACT_VARIANT)]
    #[tokio::test]
    async fn keyword_classifier_scores_latest_message(
        #[case] text: &str,
        #[case] expected: &str,
    ) {
        let classifier = KeywordClassifier::builtin().unwrap();
        let name = classifier
            .classify(&[ChatMessage::user(text)])
            .await
            .unwrap();
        assert_eq!(name, expected);
    }

    #[rstest]
    #[case("please", None)]
    #[case("pleased to meet you", None)]
    #[case("contractor in town", None)]
    #[case("contract", Some(CONTRACT_VARIANT))]
    #[case("contract, agreement", Some(CONTRACT_VARIANT))]
    fn keywords_match_whole_words_only(#[case] text: &str, #[case] expected: Option<&str>) {
        assert_eq!(KeywordClassifier::builtin().unwrap().score(text), expected);
    }

    #[test]
    fn ties_go_to_the_earlier_rule() {
        let classifier = KeywordClassifier::builtin().unwrap();
        assert_eq!(classifier.score("research this contract"), Some(CONTRACT_VARIANT));
    }

    #[test]
    fn more_distinct_hits_beat_rule_order() {
        let classifier = KeywordClassifier::builtin().unwrap();
        assert_eq!(
            classifier.score("research the latest reform affecting my contract"),
            Some(RESEARCH_VARIANT)
        );
    }

    #[test]
    fn custom_rules_match_phrases() {
        let classifier = KeywordClassifier::new(
            vec![("audit".into(), vec!["Due Diligence".into()])],
            "general",
        )
        .unwrap();
        assert_eq!(classifier.score("we need due diligence on the buyer"), Some("audit"));
        assert_eq!(classifier.score("due to diligence"), None);
    }

    #[tokio::test]
    async fn keyword_classifier_falls_back_to_older_user_messages() {
        let classifier = KeywordClassifier::builtin().unwrap();
        let messages = vec![
            ChatMessage::user("I need a contract"),
            ChatMessage::assistant("Who are the parties? This agreement needs them."),
            ChatMessage::user("Ana and Luis, 12 months"),
        ];
        assert_eq!(classifier.classify(&messages).await.unwrap(), CONTRACT_VARIANT);
    }

    #[tokio::test]
    async fn keyword_classifier_ignores_assistant_text() {
        let classifier = KeywordClassifier::builtin().unwrap();
        let messages = vec![
            ChatMessage::assistant("Do you need a contract?"),
            ChatMessage::user("Hi"),
        ];
        assert_eq!(classifier.classify(&messages).await.unwrap(), GENERAL_VARIANT);
    }

    struct Answer(std::result::Result<String, ExecutionError>);

    #[async_trait]
    impl AgentExecutor for Answer {
        fn id(&self) -> &str {
            "answer"
        }

        async fn run(
            &self,
            variant: &AgentVariant,
            messages: &[ChatMessage],
        ) -> std::result::Result<String, ExecutionError> {
            assert_eq!(variant.name, "triage");
            assert!(messages.iter().all(|m| !matches!(m, ChatMessage::System { .. })));
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn model_classifier_cleans_answer() {
        let classifier = ModelClassifier::new(
            Arc::new(Answer(Ok(" \"Contract\".\n".into()))),
            &VariantRegistry::builtin(),
            None,
        );
        let messages = vec![ChatMessage::system("preamble"), ChatMessage::user("x")];
        assert_eq!(classifier.classify(&messages).await.unwrap(), "contract");
    }

    #[tokio::test]
    async fn model_classifier_propagates_engine_errors() {
        let classifier = ModelClassifier::new(
            Arc::new(Answer(Err(ExecutionError::transport("down")))),
            &VariantRegistry::builtin(),
            None,
        );
        assert!(classifier.classify(&[ChatMessage::user("x")]).await.is_err());
    }
}
