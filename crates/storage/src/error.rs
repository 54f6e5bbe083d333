use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    #[snafu(display("failed to create state directory at {path}"))]
    CreateStateDirectory {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to read state file from {path}"))]
    ReadStateFile {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to write state file to {path}"))]
    WriteStateFile {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to replace state file from {from} to {to}"))]
    RenameStateFile {
        stage: &'static str,
        from: String,
        to: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize key-value state on `{stage}`: {source}"))]
    SerializeState {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to serialize message history on `{stage}`: {source}"))]
    SerializeHistory {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("storage id '{raw}' is invalid for {id_type}"))]
    InvalidId {
        stage: &'static str,
        id_type: &'static str,
        raw: String,
        source: uuid::Error,
    },
    #[snafu(display("display name must not be blank"))]
    InvalidDisplayName { stage: &'static str },
}

pub type StorageResult<T> = Result<T, StorageError>;
