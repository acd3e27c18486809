//! Handler seam: where classified events leave the webhook.

use tokio::sync::mpsc;

use crate::event::MessagingEvent;

/// Receives each classified event. Called once per entry, possibly from
/// concurrent requests; implementations synchronize their own shared state.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: MessagingEvent);
}

impl<F> EventHandler for F
where
    F: Fn(MessagingEvent) + Send + Sync,
{
    fn handle(&self, event: MessagingEvent) {
        self(event)
    }
}

/// Hand events off to a worker task. A closed receiver drops the event.
impl EventHandler for mpsc::UnboundedSender<MessagingEvent> {
    fn handle(&self, event: MessagingEvent) {
        if self.send(event).is_err() {
            log::debug!("webhook: event receiver closed, dropping event");
        }
    }
}
