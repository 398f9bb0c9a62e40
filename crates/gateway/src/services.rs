//! Wires collaborators from [`LexlinkerConfig`].

use std::{path::Path, sync::Arc};

use {
    lexlinker_agents::{
        AgentExecutor, BackoffCaller, Guardrail, GuardrailKind, ModelGuardrail, NoopGuardrail,
        RetryPolicy, VariantRegistry, providers::OpenAiExecutor,
    },
    lexlinker_channels::ChannelOutbound,
    lexlinker_chat::Orchestrator,
    lexlinker_config::{ClassifierKind, LexlinkerConfig},
    lexlinker_routing::{Classifier, KeywordClassifier, ModelClassifier, Router, SlotDetector},
    lexlinker_sessions::{HistoryStore, JsonlHistoryStore},
    lexlinker_whatsapp::{TwilioAccount, TwilioOutbound},
    secrecy::Secret,
    tracing::{info, warn},
};

use crate::state::GatewayState;

/// The OpenAI-compatible engine, or one that fails every call with an auth
/// error when no key is configured.
pub fn build_executor(config: &LexlinkerConfig) -> Arc<dyn AgentExecutor> {
    let key = match &config.provider.api_key {
        Some(key) => key.clone(),
        None => {
            warn!("no provider API key configured, engine calls will fail");
            Secret::new(String::new())
        },
    };
    Arc::new(OpenAiExecutor::new(
        key,
        config.provider.model.clone(),
        config.provider.base_url.clone(),
    ))
}

/// History store rooted at `<data_dir>/conversations`.
pub fn build_store(config: &LexlinkerConfig, data_dir: &Path) -> Arc<JsonlHistoryStore> {
    Arc::new(JsonlHistoryStore::new(
        data_dir.join("conversations"),
        config.history.limit,
    ))
}

pub fn build_router(
    config: &LexlinkerConfig,
    executor: Arc<dyn AgentExecutor>,
) -> anyhow::Result<Router> {
    let mut registry = VariantRegistry::builtin();
    registry.set_default_model(&config.provider.model);
    let classifier: Arc<dyn Classifier> = match config.routing.classifier {
        ClassifierKind::Keyword => Arc::new(KeywordClassifier::builtin()?),
        ClassifierKind::Model => Arc::new(ModelClassifier::new(
            executor,
            &registry,
            config.routing.triage_model.clone(),
        )),
    };
    Ok(Router::new(
        Arc::new(registry),
        classifier,
        SlotDetector::builtin()?,
    ))
}

fn build_guardrail(
    enabled: bool,
    executor: &Arc<dyn AgentExecutor>,
    kind: GuardrailKind,
    model: Option<String>,
) -> Arc<dyn Guardrail> {
    if enabled {
        Arc::new(ModelGuardrail::new(Arc::clone(executor), kind, model))
    } else {
        Arc::new(NoopGuardrail)
    }
}

/// Orchestrator over `store` with routing, retry policy and guardrails from
/// `config`.
pub fn build_orchestrator(
    config: &LexlinkerConfig,
    store: Arc<dyn HistoryStore>,
    executor: Arc<dyn AgentExecutor>,
) -> anyhow::Result<Orchestrator> {
    let router = build_router(config, Arc::clone(&executor))?;
    let policy = RetryPolicy::new(config.retry.max_attempts, config.retry.initial_delay());
    let input = build_guardrail(
        config.guardrails.input,
        &executor,
        GuardrailKind::Moderation,
        config.guardrails.model.clone(),
    );
    let output = build_guardrail(
        config.guardrails.output,
        &executor,
        GuardrailKind::Disclaimer,
        config.guardrails.model.clone(),
    );

    let caller = BackoffCaller::new(executor, policy);
    let mut orchestrator =
        Orchestrator::new(store, Arc::new(router), caller).with_guardrails(input, output);
    if let Some(preamble) = &config.routing.preamble {
        orchestrator = orchestrator.with_preamble(preamble.clone());
    }
    Ok(orchestrator)
}

/// Twilio transport, when its credentials are complete.
pub fn build_outbound(config: &LexlinkerConfig) -> Option<Arc<dyn ChannelOutbound>> {
    let twilio = &config.twilio;
    if !twilio.is_configured() {
        return None;
    }
    let (Some(sid), Some(token), Some(from)) = (
        twilio.account_sid.clone(),
        twilio.auth_token.clone(),
        twilio.phone_number.clone(),
    ) else {
        return None;
    };
    let account = TwilioAccount::new(sid, token, from).with_api_base(twilio.api_base.clone());
    Some(Arc::new(TwilioOutbound::new(account)))
}

/// Everything the HTTP surface needs.
pub fn build_state(config: &LexlinkerConfig, data_dir: &Path) -> anyhow::Result<Arc<GatewayState>> {
    let executor = build_executor(config);
    let store = build_store(config, data_dir);
    info!(
        dir = %store.base_dir().display(),
        history_limit = store.history_limit(),
        "conversation store ready"
    );
    let orchestrator = build_orchestrator(config, store, executor)?;
    let outbound = build_outbound(config);
    if outbound.is_none() {
        info!("twilio not configured, long replies will be returned inline");
    }
    Ok(GatewayState::with_options(
        orchestrator,
        outbound,
        config.outbound.chunk_limit,
        config.server.debug_routes,
    ))
}
