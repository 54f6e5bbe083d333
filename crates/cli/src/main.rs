use std::sync::Arc;

use paychat_chat::{SessionController, SessionEvents};
use paychat_llm::{MessageGateway, create_endpoint};
use paychat_storage::{ConversationStore, JsonFileStore};
use snafu::ResultExt;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use paychat::error::{
    AppResult, ConfigureEndpointSnafu, InvalidSettingsSnafu, OpenStateSnafu, RestoreSessionSnafu,
};
use paychat::settings::SettingsStore;
use paychat::shell;
use paychat::viewport::FixedViewport;

/// Terminal entry point.
///
/// Logs go to stderr at `warn` unless `RUST_LOG` says otherwise, so they stay out
/// of the conversation on stdout.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run().await {
        tracing::error!(error = %error, "paychat exited with an error");
        eprintln!("paychat: {}", snafu::Report::from_error(error));
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let settings_store = SettingsStore::load();
    let settings = settings_store
        .validated()
        .context(InvalidSettingsSnafu {
            stage: "validate-settings",
        })?
        .clone();
    tracing::info!(config_path = ?settings_store.config_path(), state_path = ?settings.state_path, "settings loaded");

    let endpoint =
        create_endpoint(settings.to_endpoint_config()).context(ConfigureEndpointSnafu {
            stage: "create-endpoint",
        })?;

    let kv = JsonFileStore::open(settings.state_path.clone()).context(OpenStateSnafu {
        stage: "open-state-file",
    })?;
    let store = ConversationStore::new(Arc::new(kv));

    let (events, events_rx) = SessionEvents::channel();
    let gateway = MessageGateway::new(endpoint, Arc::new(events.clone()));
    let controller = Arc::new(
        SessionController::new(store, gateway, events).context(RestoreSessionSnafu {
            stage: "restore-session",
        })?,
    );

    let viewport = FixedViewport::with_columns(settings.render_width);
    shell::run(
        controller,
        events_rx,
        &viewport,
        BufReader::new(tokio::io::stdin()),
    )
    .await
}
