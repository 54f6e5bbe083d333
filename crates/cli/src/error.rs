use paychat_llm::EndpointError;
use paychat_storage::StorageError;
use snafu::Snafu;

pub type AppResult<T> = Result<T, AppError>;
pub type SettingsResult<T> = Result<T, SettingsError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SettingsError {
    #[snafu(display("api_key is blank; set it in {config_path} or PAYCHAT_API_KEY (stage {stage})"))]
    MissingApiKey {
        stage: &'static str,
        config_path: String,
    },
    #[snafu(display(
        "chatbot_id is blank; set it in {config_path} or PAYCHAT_CHATBOT_ID (stage {stage})"
    ))]
    MissingChatbotId {
        stage: &'static str,
        config_path: String,
    },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AppError {
    #[snafu(display("invalid settings at stage {stage}"))]
    InvalidSettings {
        stage: &'static str,
        source: SettingsError,
    },
    #[snafu(display("failed to open conversation state at stage {stage}"))]
    OpenState {
        stage: &'static str,
        source: StorageError,
    },
    #[snafu(display("failed to configure chatbot endpoint at stage {stage}"))]
    ConfigureEndpoint {
        stage: &'static str,
        source: EndpointError,
    },
    #[snafu(display("failed to restore session at stage {stage}"))]
    RestoreSession {
        stage: &'static str,
        source: StorageError,
    },
    #[snafu(display("terminal io failed at stage {stage}"))]
    TerminalIo {
        stage: &'static str,
        source: std::io::Error,
    },
}
