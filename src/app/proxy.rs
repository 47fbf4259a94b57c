//! Defines an abstraction over the event sending mechanism.

use super::events::SessionEvent;
use tokio::sync::mpsc::UnboundedSender;

/// A trait that abstracts the sending of session events.
/// This is "fire-and-forget" and doesn't return a result, simplifying its use.
pub trait EventProxy: Send + Sync + Clone + 'static {
    fn send_event(&self, event: SessionEvent);
}

/// Channel-backed proxy used by the CLI and the tests.
impl EventProxy for UnboundedSender<SessionEvent> {
    fn send_event(&self, event: SessionEvent) {
        // A dropped receiver only means nobody is listening anymore.
        if let Err(e) = self.send(event) {
            tracing::debug!("Dropped session event: {:?}", e.0);
        }
    }
}
