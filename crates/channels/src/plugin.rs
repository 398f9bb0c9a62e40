use async_trait::async_trait;

use crate::Result;

/// Send messages to a channel recipient.
///
/// `to` is the normalized conversation identity; adapters re-add whatever
/// transport prefix their API expects.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    fn channel_type(&self) -> &str;

    async fn send_text(&self, to: &str, text: &str) -> Result<()>;
}
