use std::sync::Arc;

use {
    lexlinker_channels::{ChannelOutbound, DEFAULT_CHUNK_LIMIT},
    lexlinker_chat::Orchestrator,
};

/// Shared state behind every route.
pub struct GatewayState {
    pub orchestrator: Orchestrator,
    /// When `None`, long replies are returned inline as several TwiML
    /// messages instead of being sent through the API.
    pub outbound: Option<Arc<dyn ChannelOutbound>>,
    pub chunk_limit: usize,
    pub debug_routes: bool,
    pub version: String,
}

impl GatewayState {
    pub fn new(orchestrator: Orchestrator) -> Arc<Self> {
        Self::with_options(orchestrator, None, DEFAULT_CHUNK_LIMIT, false)
    }

    pub fn with_options(
        orchestrator: Orchestrator,
        outbound: Option<Arc<dyn ChannelOutbound>>,
        chunk_limit: usize,
        debug_routes: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            orchestrator,
            outbound,
            chunk_limit,
            debug_routes,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}
