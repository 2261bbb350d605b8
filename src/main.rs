//! The main entry point for the machine-builder application.
mod api;
mod app;
mod catalog;
mod error;
mod http;
mod logging;
mod logstream;
mod search;
mod sse;
mod types;
mod ui;
mod web;
mod wizard;

/// The main function of the application.
///
/// Parses the command line and runs the chosen subcommand: the log viewer,
/// the create wizard, one of the one-shot API commands, or the proxy server.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the subcommand fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::launch().await
}
