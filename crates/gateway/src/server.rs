use std::{net::SocketAddr, path::Path, sync::Arc};

use {
    axum::{
        Form, Router,
        extract::{Path as UrlPath, State},
        http::{StatusCode, header},
        response::{IntoResponse, Json, Response},
        routing::{get, post},
    },
    lexlinker_channels::deliver,
    lexlinker_config::LexlinkerConfig,
    lexlinker_sessions::ConversationIdentity,
    lexlinker_whatsapp::{empty_response, messaging_response},
    serde::Deserialize,
    serde_json::json,
    tower_http::trace::TraceLayer,
    tracing::{debug, error, info, warn},
};

use crate::{
    reply::{ReplyPlan, plan_reply},
    services::build_state,
    state::GatewayState,
};

/// Answer for failures whose detail stays in the logs.
const GENERIC_FAILURE: &str = "Error processing request";

// ── Shared app state ─────────────────────────────────────────────────────────

pub type AppState = Arc<GatewayState>;

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/webhook", post(webhook_handler))
        .route("/clear_conversation", post(clear_conversation_handler));

    if state.debug_routes {
        router = router.route("/debug/conversation/{identity}", get(debug_conversation_handler));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Start the webhook server and serve until Ctrl-C.
pub async fn start_gateway(config: LexlinkerConfig, data_dir: &Path) -> anyhow::Result<()> {
    let state = build_state(&config, data_dir)?;
    let app = build_gateway_app(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        addr = %listener.local_addr()?,
        version = %state.version,
        chunk_limit = state.chunk_limit,
        outbound = state.outbound.as_ref().map_or("none", |o| o.channel_type()),
        debug_routes = state.debug_routes,
        "gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": state.version,
    }))
}

/// Inbound message as posted by Twilio.
#[derive(Debug, Deserialize)]
struct InboundMessage {
    #[serde(rename = "From", default)]
    from: String,
    #[serde(rename = "Body", default)]
    body: String,
}

fn twiml(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

async fn webhook_handler(
    State(state): State<AppState>,
    Form(inbound): Form<InboundMessage>,
) -> Response {
    debug!(from = %inbound.from, len = inbound.body.len(), "webhook received");
    let from = inbound.from.clone();

    // Detached so a carrier timeout cannot cancel the turn halfway.
    let turn = match state
        .orchestrator
        .run_detached(inbound.from, inbound.body)
        .await
    {
        Ok(turn) => turn,
        Err(e) => {
            error!(from = %from, error = %e, "pipeline task failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE).into_response();
        },
    };

    let plan = match plan_reply(&turn.reply, state.chunk_limit, state.outbound.is_some()) {
        Ok(plan) => plan,
        Err(e) => {
            error!(from = %from, error = %e, "cannot segment reply");
            return (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE).into_response();
        },
    };

    match (plan, state.outbound.clone()) {
        (ReplyPlan::Deliver(parts), Some(outbound)) => {
            let to = ConversationIdentity::parse(&from)
                .map(|id| id.as_str().to_string())
                .unwrap_or(from);
            info!(to = %to, parts = parts.len(), "delivering reply through outbound transport");
            tokio::spawn(async move {
                let report = deliver(outbound.as_ref(), &to, &parts).await;
                if !report.is_complete() {
                    warn!(
                        to = %to,
                        delivered = report.delivered,
                        total = report.total,
                        "reply delivery incomplete"
                    );
                }
            });
            twiml(empty_response())
        },
        (ReplyPlan::Deliver(parts), None) | (ReplyPlan::Inline(parts), _) => {
            twiml(messaging_response(&parts))
        },
    }
}

#[derive(Debug, Deserialize)]
struct ClearRequest {
    #[serde(default)]
    phone_number: Option<String>,
}

fn status_json(code: StatusCode, status: &str, message: impl Into<String>) -> Response {
    (code, Json(json!({ "status": status, "message": message.into() }))).into_response()
}

async fn clear_conversation_handler(
    State(state): State<AppState>,
    Form(request): Form<ClearRequest>,
) -> Response {
    let Some(phone_number) = request.phone_number.filter(|p| !p.trim().is_empty()) else {
        return status_json(StatusCode::BAD_REQUEST, "error", "phone_number is required");
    };
    let identity = match ConversationIdentity::parse(&phone_number) {
        Ok(identity) => identity,
        Err(e) => {
            return status_json(StatusCode::BAD_REQUEST, "error", e.to_string());
        },
    };

    match state.orchestrator.clear(&identity).await {
        Ok(()) => status_json(
            StatusCode::OK,
            "success",
            format!("Conversation cleared for {phone_number}"),
        ),
        Err(e) => {
            error!(identity = %identity, error = %e, "failed to clear conversation");
            status_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "error",
                "failed to clear conversation",
            )
        },
    }
}

async fn debug_conversation_handler(
    State(state): State<AppState>,
    UrlPath(raw): UrlPath<String>,
) -> Response {
    let identity = match ConversationIdentity::parse(&raw) {
        Ok(identity) => identity,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string(), "identity": raw })),
            )
                .into_response();
        },
    };

    match state.orchestrator.store().record(&identity).await {
        Ok(Some(record)) => Json(json!({
            "identity": identity,
            "key": identity.file_stem(),
            "message_count": record.conversation_history.len(),
            "record": record,
        }))
        .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no conversation", "identity": identity })),
        )
            .into_response(),
        Err(e) => {
            error!(identity = %identity, error = %e, "failed to read conversation");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to read conversation", "identity": identity })),
            )
                .into_response()
        },
    }
}
