use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use paychat_chat::{SessionController, SessionEvent, SubmitOutcome};
use paychat_storage::{ConversationId, Message, Role};
use snafu::ResultExt;
use termimad::MadSkin;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::error::{AppResult, TerminalIoSnafu};
use crate::suggestions;
use crate::viewport::ViewportSource;

pub const AGENT_NAME: &str = "הסוכן שלי";
pub const CONNECTED_STATUS: &str = "מחובר";
pub const EMPTY_STATE_TITLE: &str = "ברוך הבא לצ'אט";
pub const EMPTY_STATE_SUBTITLE: &str = "כאן תוכל לשאול כל שאלה שתרצה לגבי השכר שלך";
pub const TYPING_INDICATOR: &str = "מכין תשובה...";
pub const WELCOME_TITLE: &str = "ברוכים הבאים למערכת השכר החכמה";
pub const NAME_PROMPT: &str = "נשמח לדעת איך לפנות אליך. השם שלך:";
pub const BUSY_MESSAGE: &str = "ממתין לתשובה קודמת...";
const USER_LABEL: &str = "אתה";

/// One line of user input, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Reset,
    Name(String),
    Say(String),
}

impl Command {
    /// Numbers pick a suggestion only while the conversation is still empty.
    pub fn parse(line: &str, log_is_empty: bool) -> Self {
        let trimmed = line.trim();
        match trimmed {
            "/quit" | "/exit" => return Self::Quit,
            "/reset" => return Self::Reset,
            _ => {}
        }

        if let Some(rest) = trimmed.strip_prefix("/name") {
            return Self::Name(rest.trim().to_string());
        }

        if log_is_empty
            && let Ok(number) = trimmed.parse::<usize>()
            && let Some(question) = suggestions::by_number(number)
        {
            return Self::Say(question.to_string());
        }

        Self::Say(line.to_string())
    }
}

/// Incremental text renderer for the message log.
pub struct Renderer {
    skin: MadSkin,
    width: Arc<AtomicUsize>,
    rendered_conversation: Option<ConversationId>,
    rendered_count: usize,
}

impl Renderer {
    pub fn new(width: Arc<AtomicUsize>) -> Self {
        Self {
            skin: MadSkin::default(),
            width,
            rendered_conversation: None,
            rendered_count: 0,
        }
    }

    pub fn header() -> String {
        format!("{AGENT_NAME} · {CONNECTED_STATUS}\n")
    }

    pub fn empty_state() -> String {
        format!(
            "{EMPTY_STATE_TITLE}\n{EMPTY_STATE_SUBTITLE}\n\n{}",
            suggestions::render()
        )
    }

    /// Renders messages not yet shown. A new conversation starts over.
    pub fn render_new(&mut self, conversation_id: ConversationId, messages: &[Message]) -> String {
        if self.rendered_conversation != Some(conversation_id) || messages.len() < self.rendered_count {
            self.rendered_conversation = Some(conversation_id);
            self.rendered_count = 0;
            if messages.is_empty() {
                return Self::empty_state();
            }
        }

        let out = messages[self.rendered_count..]
            .iter()
            .map(|message| self.render_message(message))
            .collect::<String>();
        self.rendered_count = messages.len();
        out
    }

    /// Renders one `MessageLogChanged`. Changes queued for a conversation that has
    /// since been replaced print nothing; the replacement's own event follows.
    pub fn render_change(
        &mut self,
        changed: ConversationId,
        current: ConversationId,
        messages: &[Message],
    ) -> String {
        if changed != current {
            return String::new();
        }
        self.render_new(current, messages)
    }

    fn render_message(&self, message: &Message) -> String {
        let time = message.timestamp.format("%H:%M");
        match message.role {
            Role::User => format!("{USER_LABEL} ({time}): {}\n", message.display_content()),
            Role::Agent => {
                let width = self.width.load(Ordering::Relaxed);
                format!(
                    "{AGENT_NAME} ({time}):\n{}\n",
                    self.skin.text(message.display_content(), Some(width))
                )
            }
        }
    }
}

/// Interactive loop. Submits inline, so no input is read while a reply is pending.
pub async fn run<R>(
    controller: Arc<SessionController>,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    viewport: &dyn ViewportSource,
    input: R,
) -> AppResult<()>
where
    R: AsyncBufRead + Unpin,
{
    let width = Arc::new(AtomicUsize::new(viewport.current().columns));
    let sink = width.clone();
    viewport.on_viewport_change(Box::new(move |size| {
        sink.store(size.columns, Ordering::Relaxed);
    }));

    let mut lines = input.lines();
    println!("{}", Renderer::header());

    if controller.display_name().is_none() {
        println!("{WELCOME_TITLE}\n{NAME_PROMPT}");
        while let Some(line) = lines
            .next_line()
            .await
            .context(TerminalIoSnafu { stage: "read-name" })?
        {
            match controller.set_display_name(&line) {
                Ok(name) => {
                    tracing::info!("display name captured");
                    println!("שלום {name}!\n");
                    break;
                }
                Err(_) => println!("{NAME_PROMPT}"),
            }
        }
    }

    let mut renderer = Renderer::new(width);
    print!(
        "{}",
        renderer.render_new(controller.conversation_id(), &controller.messages())
    );

    let render_controller = controller.clone();
    let render_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::MessageLogChanged {
                    conversation_id, ..
                } => {
                    let (current, messages) = render_controller.snapshot();
                    print!(
                        "{}",
                        renderer.render_change(conversation_id, current, &messages)
                    );
                }
                SessionEvent::BusyChanged(true) => println!("{TYPING_INDICATOR}"),
                SessionEvent::BusyChanged(false) => {}
                SessionEvent::Notice(notice) => eprintln!("! {}", notice.message),
            }
        }
    });

    while let Some(line) = lines
        .next_line()
        .await
        .context(TerminalIoSnafu { stage: "read-input" })?
    {
        let log_is_empty = controller.messages().is_empty();
        match Command::parse(&line, log_is_empty) {
            Command::Quit => break,
            Command::Reset => {
                if let Err(error) = controller.reset() {
                    tracing::warn!(error = %error, "conversation reset was not persisted");
                }
            }
            Command::Name(name) => match controller.set_display_name(&name) {
                Ok(name) => println!("שלום {name}!"),
                Err(error) => eprintln!("! {error}"),
            },
            Command::Say(text) => match controller.submit(&text).await {
                SubmitOutcome::Failed(explanation) => eprintln!("{explanation}"),
                SubmitOutcome::Rejected => println!("{BUSY_MESSAGE}"),
                SubmitOutcome::Ignored | SubmitOutcome::Answered | SubmitOutcome::Discarded => {}
            },
        }
    }

    render_task.abort();
    Ok(())
}
