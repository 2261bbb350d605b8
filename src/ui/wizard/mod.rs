//! Line-based create-machine wizard.
mod command;

pub use command::{WizardCommand, HELP};

use anyhow::Result;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::{custom_nodes_from_file, ProvisioningApi};
use crate::catalog::Catalog;
use crate::search::{DebouncedSearch, ModelSearch, SearchResult, SEARCH_DEBOUNCE};
use crate::types::{CreateMachineRequest, CustomNode, Model};
use crate::wizard::{Step, StepStatus, WizardState};

/// Catalog search results shown are capped at this many rows.
const MAX_LISTED: usize = 25;

#[derive(Debug)]
pub enum WizardOutcome {
    Submit(CreateMachineRequest),
    Quit,
}

/// The numbered entries `add` refers to.
enum Candidates {
    None,
    Nodes(Vec<CustomNode>),
    CatalogModels(Vec<Model>),
    CivitaiModels(Vec<Model>),
}

pub struct WizardPrompt {
    state: WizardState,
    catalog: Catalog,
    api: Arc<dyn ProvisioningApi>,
    search: DebouncedSearch,
    search_results: mpsc::UnboundedReceiver<SearchResult>,
    candidates: Candidates,
}

impl WizardPrompt {
    pub fn new(
        catalog: Catalog,
        api: Arc<dyn ProvisioningApi>,
        searcher: Arc<dyn ModelSearch>,
    ) -> Self {
        let (search, search_results) = DebouncedSearch::new(searcher, SEARCH_DEBOUNCE);
        Self {
            state: WizardState::new(),
            catalog,
            api,
            search,
            search_results,
            candidates: Candidates::None,
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    /// Reads commands until the user submits or quits.
    pub async fn run(mut self) -> Result<WizardOutcome> {
        let mut editor = DefaultEditor::new()?;
        self.print_steps();
        println!("{}", "Type 'help' for commands.".dimmed());

        loop {
            let prompt = format!("[{}] > ", self.state.step());
            let line = match tokio::task::block_in_place(|| editor.readline(&prompt)) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    return Ok(WizardOutcome::Quit)
                }
                Err(e) => return Err(e.into()),
            };
            if line.trim().is_empty() {
                continue;
            }
            let _ = editor.add_history_entry(line.as_str());

            match WizardCommand::parse(&line) {
                Ok(command) => {
                    if let Some(outcome) = self.execute(command).await {
                        return Ok(outcome);
                    }
                }
                Err(e) => println!("{}", e.yellow()),
            }
        }
    }

    /// Applies one command. Returns an outcome when the wizard is finished.
    pub async fn execute(&mut self, command: WizardCommand) -> Option<WizardOutcome> {
        debug!("Wizard command {:?}", command);
        match command {
            WizardCommand::List => self.list_selection(),
            WizardCommand::Search(query) => self.search_catalog(&query),
            WizardCommand::Add(numbers) => self.add(&numbers),
            WizardCommand::Remove(numbers) => self.remove(&numbers),
            WizardCommand::Workflow(path) => {
                if self.state.step() != Step::Nodes {
                    println!("{}", "Workflow files are read on the Nodes step.".yellow());
                    return None;
                }
                match custom_nodes_from_file(self.api.as_ref(), &path).await {
                    Ok(nodes) => {
                        println!("{} custom nodes found in {}", nodes.len(), path.display());
                        for node in &nodes {
                            println!("  {}", node.reference);
                        }
                        self.state.set_workflow_nodes(nodes);
                    }
                    Err(e) => println!("{}", e.to_string().red()),
                }
            }
            WizardCommand::Civitai(query) => self.search_civitai(&query).await,
            WizardCommand::Name(name) => {
                self.state.set_machine_name(name);
                println!("Machine name: {}", self.state.machine_name);
            }
            WizardCommand::Gpu(gpu) => {
                self.state.set_gpu(gpu);
                println!("GPU: {}", gpu);
            }
            WizardCommand::Deps(deps) => {
                self.state.set_dependencies(deps);
                match &self.state.dependencies {
                    Some(deps) => println!("Additional dependencies: {}", deps),
                    None => println!("Additional dependencies cleared"),
                }
            }
            WizardCommand::Next => {
                self.state.next();
                self.candidates = Candidates::None;
                self.print_steps();
            }
            WizardCommand::Back => {
                self.state.back();
                self.candidates = Candidates::None;
                self.print_steps();
            }
            WizardCommand::Submit => return self.submit(),
            WizardCommand::Help => println!("{}", HELP),
            WizardCommand::Quit => {
                self.search.cancel();
                return Some(WizardOutcome::Quit);
            }
        }
        None
    }

    fn submit(&mut self) -> Option<WizardOutcome> {
        if self.state.step() != Step::Gpu {
            println!("{}", "Finish the Nodes and Models steps first ('next').".yellow());
            return None;
        }
        if self.state.machine_name.is_empty() {
            println!("{}", "Set a machine name first ('name <machine name>').".yellow());
            return None;
        }
        self.search.cancel();
        Some(WizardOutcome::Submit(self.state.build_request()))
    }

    fn print_steps(&self) {
        let steps: Vec<String> = self
            .state
            .statuses()
            .iter()
            .map(|(step, status)| match status {
                StepStatus::Complete => format!("✓ {}", step).green().to_string(),
                StepStatus::Current => format!("▸ {}", step).bold().to_string(),
                StepStatus::Upcoming => step.to_string().dimmed().to_string(),
            })
            .collect();
        println!("{}", steps.join("   "));
    }

    fn list_selection(&self) {
        match self.state.step() {
            Step::Nodes => {
                let nodes = self.node_selection();
                if nodes.is_empty() {
                    println!("No custom nodes selected.");
                }
                for (i, (node, from_workflow)) in nodes.iter().enumerate() {
                    let origin = if *from_workflow { " (workflow)" } else { "" };
                    println!("{:>3}. {}{}", i + 1, node.display_name(), origin.dimmed());
                }
            }
            Step::Models => {
                let models: Vec<&Model> = self.state.all_models().collect();
                if models.is_empty() {
                    println!("No models selected.");
                }
                for (i, model) in models.iter().enumerate() {
                    println!("{:>3}. {} {}", i + 1, model.name, model.model_type.dimmed());
                }
            }
            Step::Gpu => {
                let name = if self.state.machine_name.is_empty() {
                    "(not set)"
                } else {
                    self.state.machine_name.as_str()
                };
                println!("Machine name: {}", name);
                println!("GPU: {}", self.state.gpu);
                println!(
                    "Custom nodes: {}, models: {}",
                    self.state.all_custom_nodes().len(),
                    self.state.all_models().count()
                );
                if let Some(deps) = &self.state.dependencies {
                    println!("Additional dependencies: {}", deps);
                }
            }
        }
    }

    /// Manual selections then workflow nodes, flagged by origin.
    fn node_selection(&self) -> Vec<(&CustomNode, bool)> {
        self.state
            .selected_nodes
            .iter()
            .map(|node| (node, false))
            .chain(self.state.workflow_nodes.iter().map(|node| (node, true)))
            .collect()
    }

    fn search_catalog(&mut self, query: &str) {
        match self.state.step() {
            Step::Nodes => {
                let found: Vec<CustomNode> =
                    self.catalog.search_nodes(query).into_iter().cloned().collect();
                for (i, node) in found.iter().take(MAX_LISTED).enumerate() {
                    let mark = self.mark(self.state.is_node_selected(node));
                    println!(
                        "{} {:>3}. {} {}",
                        mark,
                        i + 1,
                        node.display_name(),
                        node.author.dimmed()
                    );
                }
                print_overflow(found.len());
                self.candidates = Candidates::Nodes(found);
            }
            Step::Models => {
                let found: Vec<Model> =
                    self.catalog.search_models(query).into_iter().cloned().collect();
                for (i, model) in found.iter().take(MAX_LISTED).enumerate() {
                    let mark = self.mark(self.state.is_catalog_model_selected(model));
                    println!(
                        "{} {:>3}. {} {}",
                        mark,
                        i + 1,
                        model.name,
                        model.model_type.dimmed()
                    );
                }
                print_overflow(found.len());
                self.candidates = Candidates::CatalogModels(found);
            }
            Step::Gpu => println!("{}", "Nothing to search on the GPU step.".yellow()),
        }
    }

    async fn search_civitai(&mut self, query: &str) {
        if self.state.step() != Step::Models {
            println!("{}", "Civitai models are chosen on the Models step.".yellow());
            return;
        }
        let query = query.trim().to_string();
        self.search.submit(&query);

        let result = loop {
            match self.search_results.recv().await {
                Some(result) if result.query == query => break result,
                Some(_) => continue,
                None => return,
            }
        };

        match result.models {
            Ok(models) => {
                if models.is_empty() {
                    println!("No Civitai models match '{}'.", query);
                }
                for (i, model) in models.iter().enumerate() {
                    let mark = self.mark(self.state.is_civitai_model_selected(model));
                    println!("{} {:>3}. {} {}", mark, i + 1, model.name, model.base.dimmed());
                }
                self.candidates = Candidates::CivitaiModels(models);
            }
            Err(e) => println!("{}", format!("Civitai search failed: {}", e).red()),
        }
    }

    fn mark(&self, selected: bool) -> String {
        if selected {
            "[x]".green().to_string()
        } else {
            "[ ]".to_string()
        }
    }

    fn add(&mut self, numbers: &[usize]) {
        for &number in numbers {
            let index = number - 1;
            let added = match &self.candidates {
                Candidates::None => {
                    println!("{}", "Search first, then add entries by number.".yellow());
                    return;
                }
                Candidates::Nodes(nodes) => nodes.get(index).map(|node| {
                    let selected = self.state.is_node_selected(node);
                    if !selected {
                        self.state.toggle_custom_node(node.clone());
                    }
                    node.display_name().to_string()
                }),
                Candidates::CatalogModels(models) => models.get(index).map(|model| {
                    let selected = self.state.is_catalog_model_selected(model);
                    if !selected {
                        self.state.toggle_catalog_model(model.clone());
                    }
                    model.name.clone()
                }),
                Candidates::CivitaiModels(models) => models.get(index).map(|model| {
                    let selected = self.state.is_civitai_model_selected(model);
                    if !selected {
                        self.state.toggle_civitai_model(model.clone());
                    }
                    model.name.clone()
                }),
            };
            match added {
                Some(name) => println!("{} {}", "+".green(), name),
                None => println!("{}", format!("No entry {}", number).yellow()),
            }
        }
    }

    fn remove(&mut self, numbers: &[usize]) {
        let mut indices: Vec<usize> = numbers.iter().map(|n| n - 1).collect();
        indices.sort_unstable();
        indices.dedup();

        for index in indices.into_iter().rev() {
            let removed = match self.state.step() {
                Step::Nodes => {
                    let manual = self.state.selected_nodes.len();
                    if index < manual {
                        Some(self.state.selected_nodes.remove(index).display_name().to_string())
                    } else if index - manual < self.state.workflow_nodes.len() {
                        Some(self.state.workflow_nodes.remove(index - manual).reference)
                    } else {
                        None
                    }
                }
                Step::Models => {
                    let civitai = self.state.civitai_models.len();
                    if index < civitai {
                        Some(self.state.civitai_models.remove(index).name)
                    } else if index - civitai < self.state.catalog_models.len() {
                        Some(self.state.catalog_models.remove(index - civitai).name)
                    } else {
                        None
                    }
                }
                Step::Gpu => {
                    println!("{}", "Nothing to remove on the GPU step.".yellow());
                    return;
                }
            };
            match removed {
                Some(name) => println!("{} {}", "-".red(), name),
                None => println!("{}", format!("No entry {}", index + 1).yellow()),
            }
        }
    }
}

fn print_overflow(total: usize) {
    if total > MAX_LISTED {
        println!("{}", format!("... {} more, refine the search", total - MAX_LISTED).dimmed());
    } else if total == 0 {
        println!("No matches.");
    }
}
