//! HTTP surface: the carrier webhook, conversation maintenance routes and a
//! health probe.

pub mod reply;
pub mod server;
pub mod services;
pub mod state;

pub use {
    reply::{ReplyPlan, plan_reply},
    server::{build_gateway_app, start_gateway},
    state::GatewayState,
};
