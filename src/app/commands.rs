//! One-shot subcommands and the interactive flows built on them.
use super::setup::{PreparedApp, Settings};
use crate::api::apps::{filter_apps, format_relative_time, reference_time, AppStateFilter};
use crate::api::{custom_nodes_from_file, HttpProvisioningClient, ProvisioningApi};
use crate::catalog::{CatalogProvider, GithubCatalog, Origin};
use crate::logging::DiagnosticsHandle;
use crate::logstream::LogStreamSession;
use crate::search::{CivitaiClient, ModelSearch};
use crate::sse::HttpEventSource;
use crate::types::{App, FileKind, Model};
use crate::ui::{LogViewer, WizardOutcome, WizardPrompt};
use crate::web::{self, WebState};
use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Services built once per invocation.
pub struct Services {
    pub settings: Settings,
    pub client: reqwest::Client,
    pub diagnostics: DiagnosticsHandle,
    pub api: Arc<dyn ProvisioningApi>,
}

impl Services {
    pub fn new(prepared: &PreparedApp) -> Self {
        let api = HttpProvisioningClient::new(
            prepared.client.clone(),
            prepared.settings.endpoints.clone(),
        );
        Self {
            settings: prepared.settings.clone(),
            client: prepared.client.clone(),
            diagnostics: prepared.diagnostics.clone(),
            api: Arc::new(api),
        }
    }

    fn catalog(&self) -> CatalogProvider {
        CatalogProvider::new(Arc::new(GithubCatalog::new(self.client.clone())))
    }

    fn civitai(&self) -> Arc<dyn ModelSearch> {
        Arc::new(CivitaiClient::new(self.client.clone()))
    }
}

/// Opens the full-screen viewer on a machine's build logs.
pub async fn follow_logs(services: &Services, machine_id: &str) -> Result<()> {
    let base = services.settings.require_machine_base()?;
    let source = Arc::new(HttpEventSource::new(services.client.clone(), base));
    let (session, updates) = LogStreamSession::new(source, services.settings.stream);

    LogViewer::new(session, updates, machine_id)
        .with_diagnostics(services.diagnostics.clone())
        .run()
        .await
}

/// Runs the wizard and submits its request.
pub async fn create(services: &Services, as_app: bool) -> Result<()> {
    let catalog = services.catalog().load().await;
    if catalog.custom_nodes_origin == Origin::Bundled || catalog.models_origin == Origin::Bundled {
        println!("{}", "Using the bundled catalog snapshot for unreachable lists.".yellow());
    }

    let prompt = WizardPrompt::new(catalog, services.api.clone(), services.civitai());
    let request = match prompt.run().await? {
        WizardOutcome::Submit(request) => request,
        WizardOutcome::Quit => {
            println!("Nothing created.");
            return Ok(());
        }
    };

    if as_app {
        let task_id = services
            .api
            .create_app(&request)
            .await
            .context("Unable to create app")?;
        println!("{} app build started, task {}", "✓".green(), task_id.bold());
        return Ok(());
    }

    let machine_id = services
        .api
        .create_machine(&request)
        .await
        .context("Unable to create machine")?;
    info!("Created machine {}", machine_id);
    println!("{} machine {} created, following its logs", "✓".green(), machine_id.bold());
    follow_logs(services, &machine_id).await
}

pub async fn list_apps(services: &Services, state: Option<AppStateFilter>) -> Result<()> {
    let apps = services
        .api
        .list_apps()
        .await
        .context("Unable to fetch list of apps")?;
    let shown: Vec<&App> = match state {
        Some(filter) => filter_apps(&apps, filter),
        None => apps.iter().collect(),
    };

    if shown.is_empty() {
        println!("No apps.");
        return Ok(());
    }

    let now = Utc::now();
    for app in shown {
        let state = if app.state.eq_ignore_ascii_case("deployed") {
            app.state.green()
        } else {
            app.state.dimmed()
        };
        println!(
            "{}  {}  {}  {}",
            app.app_id.bold(),
            state,
            format_relative_time(reference_time(app), now),
            app.description
        );
    }
    Ok(())
}

pub async fn delete_app(services: &Services, app_id: &str) -> Result<()> {
    let deleted = services
        .api
        .delete_app(app_id)
        .await
        .context("Unable to delete app")?;
    println!("{} deleted app {}", "✓".green(), deleted);
    Ok(())
}

pub async fn list_files(services: &Services, path: &str) -> Result<()> {
    let items = services
        .api
        .list_model_files(path)
        .await
        .context("Failed to fetch items")?;
    let location = if path.is_empty() { "/" } else { path };
    println!("{}", location.bold());
    for item in items {
        match item.kind {
            FileKind::Dir => println!("  {}/", item.base_name().blue()),
            FileKind::File => println!(
                "  {}  {}",
                item.base_name(),
                item.size.as_deref().unwrap_or("").dimmed()
            ),
        }
    }
    Ok(())
}

pub async fn workflow_urls(services: &Services, app_name: &str) -> Result<()> {
    let urls = services
        .api
        .workflow_urls(app_name)
        .await
        .context("Failed to load edit workflow URL")?;
    println!("Edit: {}", urls.edit_url);
    println!("Run:  {}", urls.run_url);
    Ok(())
}

pub async fn nodes_from_workflow(services: &Services, file: &Path) -> Result<()> {
    let nodes = custom_nodes_from_file(services.api.as_ref(), file)
        .await
        .with_context(|| format!("Unable to read custom nodes from {}", file.display()))?;
    for node in nodes {
        println!("{}", node.reference);
    }
    Ok(())
}

pub async fn search_catalog(services: &Services, query: Option<&str>, models: bool) -> Result<()> {
    let catalog = services.catalog().load().await;
    let query = query.unwrap_or("");

    if models {
        for model in catalog.search_models(query) {
            print_model(model);
        }
    } else {
        for node in catalog.search_nodes(query) {
            println!("{}  {}", node.display_name().bold(), node.reference.dimmed());
        }
    }
    Ok(())
}

pub async fn search_civitai(services: &Services, query: &str) -> Result<()> {
    let models = services
        .civitai()
        .search(query)
        .await
        .context("Unable to search Civitai")?;
    if models.is_empty() {
        println!("No models found.");
    }
    for model in &models {
        print_model(model);
    }
    Ok(())
}

fn print_model(model: &Model) {
    println!(
        "{}  {} {}",
        model.name.bold(),
        model.model_type.dimmed(),
        model.url.dimmed()
    );
}

pub async fn serve(services: &Services, port: u16) -> Result<()> {
    let state = Arc::new(WebState {
        api: services.api.clone(),
        catalog: services.catalog(),
        search: services.civitai(),
    });
    web::start_server(state, port).await
}
