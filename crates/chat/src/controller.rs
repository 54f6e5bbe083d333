use std::sync::{Mutex, MutexGuard, PoisonError};

use paychat_llm::{MessageGateway, Reply};
use paychat_storage::{ConversationId, ConversationStore, Message, StorageResult};

use crate::events::{SessionEvent, SessionEvents};
use crate::message::{RequestTicket, SessionPhase, SessionTransition};

/// Result of one `submit` call as seen by the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Whitespace-only input; nothing changed.
    Ignored,
    /// Another reply is still outstanding.
    Rejected,
    Answered,
    /// Gateway failure; the log keeps only the user message.
    Failed(String),
    /// The conversation was reset while the reply was in flight.
    Discarded,
}

struct SessionState {
    conversation_id: ConversationId,
    messages: Vec<Message>,
    phase: SessionPhase,
    next_sequence: u64,
}

struct PendingSubmit {
    ticket: RequestTicket,
    history: Vec<Message>,
    display_name: Option<String>,
}

/// Owns the in-memory conversation and orchestrates store and gateway.
///
/// The state mutex is only held for synchronous sections and never across the
/// gateway call, so the busy check and the busy set happen atomically.
pub struct SessionController {
    store: ConversationStore,
    gateway: MessageGateway,
    events: SessionEvents,
    state: Mutex<SessionState>,
}

impl SessionController {
    /// Restores the persisted conversation, minting an id on first use.
    pub fn new(
        store: ConversationStore,
        gateway: MessageGateway,
        events: SessionEvents,
    ) -> StorageResult<Self> {
        let conversation_id = store.get_id()?;
        let messages = store.load_history();
        tracing::info!(
            conversation_id = %conversation_id,
            message_count = messages.len(),
            "session restored"
        );

        Ok(Self {
            store,
            gateway,
            events,
            state: Mutex::new(SessionState {
                conversation_id,
                messages,
                phase: SessionPhase::Idle,
                next_sequence: 1,
            }),
        })
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock_state().messages.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.lock_state().phase.is_busy()
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.lock_state().conversation_id
    }

    /// Current conversation id and log, read under one lock.
    pub fn snapshot(&self) -> (ConversationId, Vec<Message>) {
        let state = self.lock_state();
        (state.conversation_id, state.messages.clone())
    }

    pub fn display_name(&self) -> Option<String> {
        self.store.get_display_name()
    }

    pub fn set_display_name(&self, name: &str) -> StorageResult<String> {
        self.store.set_display_name(name)
    }

    /// Sends `text` as the next user turn and waits for the reply.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let pending = match self.begin_submit(text) {
            Ok(pending) => pending,
            Err(outcome) => return outcome,
        };

        let mut guard = SettleGuard {
            controller: self,
            ticket: pending.ticket,
            armed: true,
        };
        let reply = self
            .gateway
            .send(
                text,
                &pending.history,
                pending.ticket.conversation_id,
                pending.display_name.as_deref(),
            )
            .await;
        guard.armed = false;

        self.settle(pending.ticket, reply)
    }

    /// Drops the conversation and starts a fresh one. Always ends in `Idle`.
    pub fn reset(&self) -> StorageResult<ConversationId> {
        let mut state = self.lock_state();
        let was_busy = state.phase.is_busy();
        state.phase = state
            .phase
            .apply(SessionTransition::Reset)
            .unwrap_or_default();
        state.messages.clear();

        let persisted = self.store.reset().and_then(|()| self.store.get_id());
        state.conversation_id = match &persisted {
            Ok(conversation_id) => *conversation_id,
            Err(error) => {
                tracing::warn!(error = %error, "failed to persist conversation reset");
                ConversationId::new_v7()
            }
        };
        let conversation_id = state.conversation_id;
        drop(state);

        self.events.emit(SessionEvent::MessageLogChanged {
            conversation_id,
            message_count: 0,
        });
        if was_busy {
            tracing::debug!("reset while awaiting reply; the pending reply will be discarded");
            self.events.emit(SessionEvent::BusyChanged(false));
        }

        persisted
    }

    fn begin_submit(&self, text: &str) -> Result<PendingSubmit, SubmitOutcome> {
        if text.trim().is_empty() {
            tracing::debug!("ignoring blank submit");
            return Err(SubmitOutcome::Ignored);
        }

        let display_name = self.store.get_display_name();
        let mut state = self.lock_state();
        let ticket = RequestTicket::new(state.conversation_id, state.next_sequence);
        state.phase = match state.phase.apply(SessionTransition::Submit(ticket)) {
            Ok(next) => next,
            Err(rejection) => {
                tracing::debug!(?rejection, "submit rejected while awaiting reply");
                return Err(SubmitOutcome::Rejected);
            }
        };
        state.next_sequence = state.next_sequence.saturating_add(1);

        let history = state.messages.clone();
        state.messages.push(Message::user(text));
        self.persist(&state);
        let message_count = state.messages.len();
        drop(state);

        self.events.emit(SessionEvent::MessageLogChanged {
            conversation_id: ticket.conversation_id,
            message_count,
        });
        self.events.emit(SessionEvent::BusyChanged(true));

        Ok(PendingSubmit {
            ticket,
            history,
            display_name,
        })
    }

    fn settle(&self, ticket: RequestTicket, reply: Reply) -> SubmitOutcome {
        let mut state = self.lock_state();
        state.phase = match state.phase.apply(SessionTransition::Settle(ticket)) {
            Ok(next) => next,
            Err(rejection) => {
                tracing::debug!(?rejection, "discarding stale reply");
                return SubmitOutcome::Discarded;
            }
        };

        let (outcome, message_count) = match reply {
            Reply::Answer(text) => {
                state.messages.push(Message::agent(text));
                self.persist(&state);
                (SubmitOutcome::Answered, Some(state.messages.len()))
            }
            Reply::Failure(text) => (SubmitOutcome::Failed(text), None),
        };
        drop(state);

        if let Some(message_count) = message_count {
            self.events.emit(SessionEvent::MessageLogChanged {
                conversation_id: ticket.conversation_id,
                message_count,
            });
        }
        self.events.emit(SessionEvent::BusyChanged(false));
        outcome
    }

    fn abandon(&self, ticket: RequestTicket) {
        let mut state = self.lock_state();
        let Ok(next) = state.phase.apply(SessionTransition::Settle(ticket)) else {
            return;
        };
        state.phase = next;
        drop(state);

        tracing::warn!(
            conversation_id = %ticket.conversation_id,
            sequence = ticket.sequence,
            "submit dropped before its reply settled"
        );
        self.events.emit(SessionEvent::BusyChanged(false));
    }

    fn persist(&self, state: &SessionState) {
        if let Err(error) = self.store.save_history(&state.messages) {
            tracing::warn!(
                conversation_id = %state.conversation_id,
                error = %error,
                "failed to persist message history"
            );
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the controller to `Idle` if a submit future is dropped mid-flight.
struct SettleGuard<'a> {
    controller: &'a SessionController,
    ticket: RequestTicket,
    armed: bool,
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.controller.abandon(self.ticket);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;
    use futures::future::BoxFuture;
    use paychat_llm::{ChatRequest, ChatbotEndpoint, EndpointError, EndpointResult, NoticeKind};
    use paychat_storage::{MemoryStore, Role};
    use tokio::sync::{mpsc, oneshot};

    use super::*;

    type Release = oneshot::Sender<EndpointResult<String>>;

    /// Endpoint whose replies are released by the test, in call order.
    #[derive(Default)]
    struct GatedEndpoint {
        gates: Mutex<VecDeque<oneshot::Receiver<EndpointResult<String>>>>,
        calls: AtomicUsize,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl GatedEndpoint {
        fn gate(&self) -> Release {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().push_back(rx);
            tx
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ChatbotEndpoint for GatedEndpoint {
        fn id(&self) -> &str {
            "gated"
        }

        fn chatbot_id(&self) -> &str {
            "bot-1"
        }

        fn complete<'a>(&'a self, request: ChatRequest) -> BoxFuture<'a, EndpointResult<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request);
            let gate = self.gates.lock().unwrap().pop_front();
            Box::pin(async move {
                match gate {
                    Some(gate) => gate.await.unwrap_or_else(|_| Err(network_error())),
                    None => Err(network_error()),
                }
            })
        }
    }

    fn network_error() -> EndpointError {
        EndpointError::DecodeResponse {
            stage: "simulated-network-error",
            source: serde_json::from_str::<u8>("").unwrap_err(),
        }
    }

    struct Harness {
        controller: Arc<SessionController>,
        endpoint: Arc<GatedEndpoint>,
        kv: Arc<MemoryStore>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_store(Arc::new(MemoryStore::new()))
        }

        fn with_store(kv: Arc<MemoryStore>) -> Self {
            let endpoint = Arc::new(GatedEndpoint::default());
            let (events, rx) = SessionEvents::channel();
            let gateway = MessageGateway::new(endpoint.clone(), Arc::new(events.clone()));
            let controller = SessionController::new(
                ConversationStore::new(kv.clone()),
                gateway,
                events,
            )
            .expect("controller");

            Self {
                controller: Arc::new(controller),
                endpoint,
                kv,
                events: rx,
            }
        }

        fn store(&self) -> ConversationStore {
            ConversationStore::new(self.kv.clone())
        }

        fn drain(&mut self) -> Vec<SessionEvent> {
            let mut drained = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                drained.push(event);
            }
            drained
        }

        async fn wait_until_busy(&self) {
            while !self.controller.is_busy() {
                tokio::task::yield_now().await;
            }
        }
    }

    fn transcript(messages: &[Message]) -> Vec<(Role, &str)> {
        messages
            .iter()
            .map(|message| (message.role, message.content.as_str()))
            .collect()
    }

    fn notices(events: &[SessionEvent]) -> usize {
        events
            .iter()
            .filter(|event| matches!(event, SessionEvent::Notice(_)))
            .count()
    }

    #[tokio::test]
    async fn hebrew_exchange_appends_user_then_agent() {
        let mut harness = Harness::new();
        harness
            .endpoint
            .gate()
            .send(Ok("הי! איך אפשר לעזור?".to_string()))
            .unwrap();

        let outcome = harness.controller.submit("שלום").await;

        assert_eq!(outcome, SubmitOutcome::Answered);
        let messages = harness.controller.messages();
        assert_eq!(
            transcript(&messages),
            vec![(Role::User, "שלום"), (Role::Agent, "הי! איך אפשר לעזור?")]
        );
        assert!(!harness.controller.is_busy());
        assert_eq!(harness.store().load_history(), messages);

        let conversation_id = harness.controller.conversation_id();
        assert_eq!(
            harness.drain(),
            vec![
                SessionEvent::MessageLogChanged {
                    conversation_id,
                    message_count: 1,
                },
                SessionEvent::BusyChanged(true),
                SessionEvent::MessageLogChanged {
                    conversation_id,
                    message_count: 2,
                },
                SessionEvent::BusyChanged(false),
            ]
        );
    }

    #[tokio::test]
    async fn user_message_is_logged_before_the_gateway_call() {
        let harness = Harness::new();
        harness.endpoint.gate().send(Ok("ok".to_string())).unwrap();

        harness.controller.submit("  first question ").await;
        harness.endpoint.gate().send(Ok("ok".to_string())).unwrap();
        harness.controller.submit("second").await;

        let requests = harness.endpoint.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(requests[0].messages[0].content, "  first question ");
        assert_eq!(requests[1].messages.len(), 3);
        assert_eq!(
            requests[1].conversation_id,
            harness.controller.conversation_id().to_string()
        );
    }

    #[tokio::test]
    async fn whitespace_submit_is_a_no_op() {
        let mut harness = Harness::new();

        assert_eq!(harness.controller.submit(" \n\t ").await, SubmitOutcome::Ignored);
        assert_eq!(harness.controller.submit("").await, SubmitOutcome::Ignored);

        assert!(harness.controller.messages().is_empty());
        assert!(!harness.controller.is_busy());
        assert_eq!(harness.endpoint.calls(), 0);
        assert!(harness.drain().is_empty());
    }

    #[tokio::test]
    async fn concurrent_submit_is_rejected_while_awaiting() {
        let harness = Harness::new();
        let release = harness.endpoint.gate();

        let first = tokio::spawn({
            let controller = harness.controller.clone();
            async move { controller.submit("first").await }
        });
        harness.wait_until_busy().await;

        assert_eq!(
            harness.controller.submit("second").await,
            SubmitOutcome::Rejected
        );

        release.send(Ok("reply".to_string())).unwrap();
        assert_eq!(first.await.unwrap(), SubmitOutcome::Answered);

        assert_eq!(harness.endpoint.calls(), 1);
        assert_eq!(
            transcript(&harness.controller.messages()),
            vec![(Role::User, "first"), (Role::Agent, "reply")]
        );
    }

    #[tokio::test]
    async fn failed_send_keeps_only_user_message_and_notifies_once() {
        let mut harness = Harness::new();
        harness.endpoint.gate().send(Err(network_error())).unwrap();

        let outcome = harness.controller.submit("test").await;

        assert!(matches!(outcome, SubmitOutcome::Failed(ref text) if text.starts_with("שגיאה")));
        assert_eq!(
            transcript(&harness.controller.messages()),
            vec![(Role::User, "test")]
        );
        assert!(!harness.controller.is_busy());
        assert_eq!(
            transcript(&harness.store().load_history()),
            vec![(Role::User, "test")]
        );

        let events = harness.drain();
        assert_eq!(notices(&events), 1);
        assert_eq!(events.last(), Some(&SessionEvent::BusyChanged(false)));
    }

    #[tokio::test]
    async fn status_failure_clears_busy_and_reports_send_failure() {
        let mut harness = Harness::new();
        harness
            .endpoint
            .gate()
            .send(Err(EndpointError::Status {
                stage: "simulated",
                status: 503,
                reason: "Service Unavailable".to_string(),
                body: String::new(),
            }))
            .unwrap();

        let outcome = harness.controller.submit("test").await;

        assert_eq!(
            outcome,
            SubmitOutcome::Failed("שגיאה: Service Unavailable".to_string())
        );
        assert!(!harness.controller.is_busy());
        let kinds = harness
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::Notice(notice) => Some(notice.kind),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(kinds, vec![NoticeKind::SendFailed]);
    }

    #[tokio::test]
    async fn reply_arriving_after_reset_is_discarded() {
        let harness = Harness::new();
        let before = harness.controller.conversation_id();
        let release = harness.endpoint.gate();

        let pending = tokio::spawn({
            let controller = harness.controller.clone();
            async move { controller.submit("שלום").await }
        });
        harness.wait_until_busy().await;

        let after = harness.controller.reset().expect("reset");
        assert_ne!(after, before);
        assert!(!harness.controller.is_busy());

        release.send(Ok("late reply".to_string())).unwrap();
        assert_eq!(pending.await.unwrap(), SubmitOutcome::Discarded);

        assert_eq!(harness.controller.snapshot(), (after, Vec::new()));
        assert!(harness.store().load_history().is_empty());
    }

    #[tokio::test]
    async fn stale_reply_does_not_release_a_newer_submit() {
        let harness = Harness::new();
        let release_old = harness.endpoint.gate();
        let release_new = harness.endpoint.gate();

        let old = tokio::spawn({
            let controller = harness.controller.clone();
            async move { controller.submit("old").await }
        });
        harness.wait_until_busy().await;
        harness.controller.reset().expect("reset");

        let new = tokio::spawn({
            let controller = harness.controller.clone();
            async move { controller.submit("new").await }
        });
        harness.wait_until_busy().await;

        release_old.send(Ok("old reply".to_string())).unwrap();
        assert_eq!(old.await.unwrap(), SubmitOutcome::Discarded);
        assert!(harness.controller.is_busy());

        release_new.send(Ok("new reply".to_string())).unwrap();
        assert_eq!(new.await.unwrap(), SubmitOutcome::Answered);
        assert_eq!(
            transcript(&harness.controller.messages()),
            vec![(Role::User, "new"), (Role::Agent, "new reply")]
        );
    }

    #[tokio::test]
    async fn reset_keeps_display_name_and_clears_history() {
        let harness = Harness::new();
        harness.controller.set_display_name("דנה").expect("name");
        harness.endpoint.gate().send(Ok("ok".to_string())).unwrap();
        harness.controller.submit("hello").await;
        let before = harness.controller.conversation_id();

        harness.controller.reset().expect("reset");

        let store = harness.store();
        assert!(store.load_history().is_empty());
        assert_ne!(store.get_id().expect("id"), before);
        assert_eq!(store.get_id().expect("id"), harness.controller.conversation_id());
        assert_eq!(harness.controller.display_name().as_deref(), Some("דנה"));
    }

    #[tokio::test]
    async fn display_name_travels_as_metadata() {
        let harness = Harness::new();
        harness.controller.set_display_name("Noa").expect("name");
        harness.endpoint.gate().send(Ok("ok".to_string())).unwrap();

        harness.controller.submit("hi").await;

        let requests = harness.endpoint.requests.lock().unwrap();
        let metadata = requests[0].metadata.as_ref().expect("metadata");
        assert_eq!(metadata.user_name, "Noa");
    }

    #[test]
    fn persisted_history_is_restored_on_start() {
        let kv = Arc::new(MemoryStore::new());
        let seeded = ConversationStore::new(kv.clone());
        let id = seeded.get_id().expect("id");
        let history = vec![Message::user("שלום"), Message::agent("הי")];
        seeded.save_history(&history).expect("seed");

        let harness = Harness::with_store(kv);

        assert_eq!(harness.controller.conversation_id(), id);
        assert_eq!(harness.controller.messages(), history);
        assert!(!harness.controller.is_busy());
    }

    #[test]
    fn dropped_submit_releases_busy_flag() {
        let mut harness = Harness::new();
        let _release = harness.endpoint.gate();

        assert!(harness.controller.submit("abandon me").now_or_never().is_none());

        assert!(!harness.controller.is_busy());
        assert_eq!(
            transcript(&harness.controller.messages()),
            vec![(Role::User, "abandon me")]
        );
        assert_eq!(harness.drain().last(), Some(&SessionEvent::BusyChanged(false)));
    }
}
