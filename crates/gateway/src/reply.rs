//! Deciding how a reply leaves the webhook.

use lexlinker_channels::split;

/// How the webhook answers for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPlan {
    /// Every part goes into the TwiML body, in order.
    Inline(Vec<String>),
    /// The webhook answers with empty TwiML and the parts are sent through
    /// the outbound transport.
    Deliver(Vec<String>),
}

/// Replies that fit the limit stay inline. Longer ones are split and sent
/// through the transport when one exists, otherwise returned inline as
/// several messages.
pub fn plan_reply(
    reply: &str,
    chunk_limit: usize,
    has_outbound: bool,
) -> lexlinker_channels::Result<ReplyPlan> {
    let parts = split(reply, chunk_limit)?;
    if parts.len() > 1 && has_outbound {
        Ok(ReplyPlan::Deliver(parts))
    } else {
        Ok(ReplyPlan::Inline(parts))
    }
}
