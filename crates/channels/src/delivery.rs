use tracing::{debug, warn};

use crate::{ChannelOutbound, Error};

/// Result of [`deliver`].
#[derive(Debug)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub total: usize,
    /// The send error that stopped delivery, if any.
    pub failure: Option<Error>,
}

impl DeliveryReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.delivered == self.total
    }
}

/// Send `parts` to `to` in index order.
///
/// Each send is awaited before the next one starts, so at most one part is
/// in flight and recipients observe parts in order. Stops at the first
/// failed send.
pub async fn deliver(outbound: &dyn ChannelOutbound, to: &str, parts: &[String]) -> DeliveryReport {
    let total = parts.len();
    for (i, part) in parts.iter().enumerate() {
        if let Err(e) = outbound.send_text(to, part).await {
            warn!(
                channel = outbound.channel_type(),
                part = i + 1,
                total,
                error = %e,
                "outbound send failed, stopping delivery"
            );
            return DeliveryReport {
                delivered: i,
                total,
                failure: Some(e),
            };
        }
        debug!(
            channel = outbound.channel_type(),
            part = i + 1,
            total,
            len = part.chars().count(),
            "sent outbound part"
        );
    }
    DeliveryReport {
        delivered: total,
        total,
        failure: None,
    }
}
