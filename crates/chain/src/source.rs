//! The opaque event transport contract

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::event::LeaseRatified;

/// Stream of decoded ratification events. A `ChainError::EventMalformed`
/// item is skippable; any other error item means the subscription is lost
/// and the stream is exhausted.
pub type EventStream = BoxStream<'static, Result<LeaseRatified>>;

/// Something that can be subscribed to for `LeaseRatified` events. The
/// ingester owns reconnection; implementations only have to fail loudly.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn subscribe(&self) -> Result<EventStream>;
}
