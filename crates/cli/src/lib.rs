pub mod error;
/// Layered settings for the terminal shell.
pub mod settings;
pub mod shell;
pub mod suggestions;
/// Host viewport capability; the shell only uses it for wrap width.
pub mod viewport;
