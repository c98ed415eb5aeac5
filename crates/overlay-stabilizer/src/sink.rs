//! Consumers of position updates

use tokio::sync::mpsc;

use crate::state::PositionUpdate;

/// Receives every update a run emits, in order.
///
/// Called from the run's task. Implementations must not block.
pub trait UpdateSink: Send + Sync + 'static {
    fn on_update(&self, update: PositionUpdate);
}

impl<F> UpdateSink for F
where
    F: Fn(PositionUpdate) + Send + Sync + 'static,
{
    fn on_update(&self, update: PositionUpdate) {
        self(update)
    }
}

/// Forwards updates into an unbounded channel. Sends after the receiver is gone are dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink(mpsc::UnboundedSender<PositionUpdate>);

impl ChannelSink {
    pub fn new(sender: mpsc::UnboundedSender<PositionUpdate>) -> Self {
        Self(sender)
    }
}

impl From<mpsc::UnboundedSender<PositionUpdate>> for ChannelSink {
    fn from(sender: mpsc::UnboundedSender<PositionUpdate>) -> Self {
        Self(sender)
    }
}

impl UpdateSink for ChannelSink {
    fn on_update(&self, update: PositionUpdate) {
        let _ = self.0.send(update);
    }
}

pub fn channel_sink() -> (ChannelSink, mpsc::UnboundedReceiver<PositionUpdate>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSink(tx), rx)
}
