use paychat_storage::ConversationId;

/// Identifier for one submit attempt.
///
/// This must change on every submit so stale replies can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestTicket {
    pub conversation_id: ConversationId,
    pub sequence: u64,
}

impl RequestTicket {
    pub const fn new(conversation_id: ConversationId, sequence: u64) -> Self {
        Self {
            conversation_id,
            sequence,
        }
    }
}

/// Session lifecycle. `AwaitingReply` is the busy state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    AwaitingReply(RequestTicket),
}

/// State transition input for the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    Submit(RequestTicket),
    Settle(RequestTicket),
    Reset,
}

/// Rejection reason for illegal session transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRejection {
    AlreadyAwaiting {
        active: RequestTicket,
        attempted: RequestTicket,
    },
    NoPendingReply {
        attempted: RequestTicket,
    },
    StaleReply {
        active: RequestTicket,
        attempted: RequestTicket,
    },
}

pub type TransitionResult = Result<SessionPhase, TransitionRejection>;

impl SessionPhase {
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::AwaitingReply(_))
    }

    pub fn active_ticket(&self) -> Option<RequestTicket> {
        match self {
            Self::AwaitingReply(ticket) => Some(*ticket),
            Self::Idle => None,
        }
    }

    /// Applies one transition deterministically.
    ///
    /// Only `Idle` may start a submit, and a settle must name the active ticket exactly.
    pub fn apply(&self, transition: SessionTransition) -> TransitionResult {
        match transition {
            SessionTransition::Submit(ticket) => self.apply_submit(ticket),
            SessionTransition::Settle(ticket) => self.apply_settle(ticket),
            SessionTransition::Reset => Ok(Self::Idle),
        }
    }

    fn apply_submit(&self, ticket: RequestTicket) -> TransitionResult {
        match self {
            Self::Idle => Ok(Self::AwaitingReply(ticket)),
            Self::AwaitingReply(active) => Err(TransitionRejection::AlreadyAwaiting {
                active: *active,
                attempted: ticket,
            }),
        }
    }

    fn apply_settle(&self, ticket: RequestTicket) -> TransitionResult {
        match self {
            Self::AwaitingReply(active) if *active == ticket => Ok(Self::Idle),
            Self::AwaitingReply(active) => Err(TransitionRejection::StaleReply {
                active: *active,
                attempted: ticket,
            }),
            Self::Idle => Err(TransitionRejection::NoPendingReply { attempted: ticket }),
        }
    }
}
