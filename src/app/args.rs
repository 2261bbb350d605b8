use crate::api::apps::AppStateFilter;
use crate::logstream::MAX_LOGS;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "machine-builder")]
#[command(about = "Create ComfyUI machines and apps, and follow their build logs")]
pub struct AppArgs {
    #[arg(
        long = "machine-api",
        env = "MACHINE_BUILDER_API_BASE_URL",
        global = true,
        help = "Base URL of the machine builder service"
    )]
    pub machine_api: Option<String>,

    #[arg(
        long = "app-api",
        env = "APP_BUILDER_API_BASE_URL",
        global = true,
        help = "Base URL of the app builder service"
    )]
    pub app_api: Option<String>,

    #[arg(
        long = "api-key",
        env = "APP_BUILDER_API_KEY",
        hide_env_values = true,
        global = true,
        help = "API key sent to the app builder service"
    )]
    pub api_key: Option<String>,

    #[arg(long, default_value_t = MAX_LOGS, global = true, help = "Log lines kept in the viewer")]
    pub max_logs: usize,

    #[arg(
        long = "flush-interval-ms",
        default_value_t = 300,
        global = true,
        help = "Milliseconds between viewer refreshes"
    )]
    pub flush_interval_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Follow the build logs of a machine
    Logs { machine_id: String },
    /// Pick custom nodes, models and a GPU, then create a machine (or an app)
    Create {
        #[arg(long, help = "Create an app instead of a machine")]
        app: bool,
    },
    /// List apps
    Apps {
        #[arg(long, value_enum, help = "Only show apps in this state")]
        state: Option<AppStateFilter>,
    },
    /// Delete an app
    DeleteApp { app_id: String },
    /// Browse the shared models volume
    Files {
        #[arg(default_value = "")]
        path: String,
    },
    /// Show the editor and runner URLs of an app's workflow
    WorkflowUrls { app_name: String },
    /// List the custom nodes a workflow file depends on
    NodesFromWorkflow { file: PathBuf },
    /// Search the custom node (or model) catalog
    Catalog {
        query: Option<String>,
        #[arg(long, help = "Search models instead of custom nodes")]
        models: bool,
    },
    /// Search Civitai for models
    Search { query: String },
    /// Serve the JSON proxy API
    Serve {
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
}

impl AppArgs {
    pub fn from_cli() -> Self {
        <Self as Parser>::parse()
    }
}
