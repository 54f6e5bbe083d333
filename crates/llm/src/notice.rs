pub const SEND_FAILED_NOTICE: &str = "שגיאה בשליחת ההודעה";
pub const CONNECTION_FAILED_NOTICE: &str = "שגיאה בהתקשרות עם השרת";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    /// The endpoint answered with a non-success status.
    SendFailed,
    /// The call never produced a usable answer (network or payload).
    ConnectionFailed,
}

/// Transient, non-persisted user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn send_failed() -> Self {
        Self::new(NoticeKind::SendFailed, SEND_FAILED_NOTICE)
    }

    pub fn connection_failed() -> Self {
        Self::new(NoticeKind::ConnectionFailed, CONNECTION_FAILED_NOTICE)
    }
}

/// Side channel for transient notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}
