pub mod args;
mod commands;
mod setup;

pub use args::AppArgs;

use anyhow::Result;
use args::Command;
use commands::Services;

/// Launches the application with the process arguments.
///
/// # Errors
///
/// This function will return an error if setup fails or the selected
/// subcommand returns one.
pub async fn launch() -> Result<()> {
    launch_with_args(AppArgs::from_cli()).await
}

pub async fn launch_with_args(args: AppArgs) -> Result<()> {
    let prepared = setup::prepare(args)?;
    let services = Services::new(&prepared);

    match &prepared.command {
        Command::Logs { machine_id } => commands::follow_logs(&services, machine_id).await,
        Command::Create { app } => commands::create(&services, *app).await,
        Command::Apps { state } => commands::list_apps(&services, *state).await,
        Command::DeleteApp { app_id } => commands::delete_app(&services, app_id).await,
        Command::Files { path } => commands::list_files(&services, path).await,
        Command::WorkflowUrls { app_name } => commands::workflow_urls(&services, app_name).await,
        Command::NodesFromWorkflow { file } => {
            commands::nodes_from_workflow(&services, file).await
        }
        Command::Catalog { query, models } => {
            commands::search_catalog(&services, query.as_deref(), *models).await
        }
        Command::Search { query } => commands::search_civitai(&services, query).await,
        Command::Serve { port } => commands::serve(&services, *port).await,
    }
}
