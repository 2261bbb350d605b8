//! This module resolves configuration and prepares shared services.
use super::args::{AppArgs, Command};
use crate::api::ApiEndpoints;
use crate::http::build_client;
use crate::logging::{self, DiagnosticsHandle};
use crate::logstream::StreamConfig;
use anyhow::{anyhow, bail, Context, Result};
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

/// Everything a subcommand needs to run.
pub struct PreparedApp {
    pub command: Command,
    pub settings: Settings,
    /// Shared HTTP client; clones reuse its connection pool.
    pub client: reqwest::Client,
    pub diagnostics: DiagnosticsHandle,
}

/// Configuration resolved from flags and environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoints: ApiEndpoints,
    pub stream: StreamConfig,
}

impl Settings {
    /// Validates the raw arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if a base URL does not parse or a tunable is zero.
    pub fn from_args(args: &AppArgs) -> Result<Self> {
        if args.max_logs == 0 {
            bail!("--max-logs must be at least 1");
        }
        if args.flush_interval_ms == 0 {
            bail!("--flush-interval-ms must be at least 1");
        }

        let machine_base = args
            .machine_api
            .as_deref()
            .map(|raw| parse_base_url(raw, "--machine-api", "MACHINE_BUILDER_API_BASE_URL"))
            .transpose()?;
        let app_base = args
            .app_api
            .as_deref()
            .map(|raw| parse_base_url(raw, "--app-api", "APP_BUILDER_API_BASE_URL"))
            .transpose()?;

        Ok(Self {
            endpoints: ApiEndpoints {
                machine_base,
                app_base,
                api_key: args.api_key.clone().filter(|key| !key.is_empty()),
            },
            stream: StreamConfig {
                max_logs: args.max_logs,
                flush_interval: Duration::from_millis(args.flush_interval_ms),
            },
        })
    }

    /// The machine builder base URL, which log streaming cannot do without.
    pub fn require_machine_base(&self) -> Result<Url> {
        self.endpoints.machine_base.clone().ok_or_else(|| {
            anyhow!(
                "Machine builder URL not provided. Supply --machine-api or set MACHINE_BUILDER_API_BASE_URL."
            )
        })
    }
}

fn parse_base_url(raw: &str, flag: &str, variable: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .with_context(|| format!("Invalid {} / {} value '{}'", flag, variable, raw))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("{} / {} must be an http(s) URL, got '{}'", flag, variable, raw);
    }
    Ok(url)
}

/// Prepares the application for running: logging, settings and the HTTP client.
///
/// # Errors
///
/// This function will return an error if the settings are invalid or the
/// HTTP client cannot be built.
pub fn prepare(args: AppArgs) -> Result<PreparedApp> {
    let diagnostics = logging::init();
    let settings = Settings::from_args(&args)?;
    debug!("Resolved settings: {:?}", settings.endpoints.machine_base);

    let client = build_client().context("Unable to build HTTP client")?;

    Ok(PreparedApp {
        command: args.command,
        settings,
        client,
        diagnostics,
    })
}
