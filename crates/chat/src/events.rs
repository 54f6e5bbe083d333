use paychat_llm::{Notice, Notifier};
use paychat_storage::ConversationId;
use tokio::sync::mpsc;

/// Events produced by the session controller for the presentation shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Re-render trigger; `message_count` is the log length after the change.
    MessageLogChanged {
        conversation_id: ConversationId,
        message_count: usize,
    },
    BusyChanged(bool),
    Notice(Notice),
}

/// Cloneable sender half of the session event channel.
///
/// Doubles as the gateway's [`Notifier`], so notices reach the shell in order with
/// the other session events.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionEvents {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("session event receiver dropped");
        }
    }
}

impl Notifier for SessionEvents {
    fn notify(&self, notice: Notice) {
        self.emit(SessionEvent::Notice(notice));
    }
}
