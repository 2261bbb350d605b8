//! State of the create-machine wizard.
//!
//! All transitions are plain methods on `WizardState` with no I/O; the prompt
//! loop in `ui::wizard` drives them and performs the network calls.
mod request;

pub use request::model_directory;

use crate::types::{CustomNode, Gpu, Model};
use std::fmt;

/// The wizard's steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Nodes,
    Models,
    Gpu,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::Nodes, Step::Models, Step::Gpu];

    pub fn id(&self) -> &'static str {
        match self {
            Step::Nodes => "01",
            Step::Models => "02",
            Step::Gpu => "03",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Step::Nodes => "Nodes",
            Step::Models => "Models",
            Step::Gpu => "GPU",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Step::Nodes => 0,
            Step::Models => 1,
            Step::Gpu => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Step> {
        Step::ALL.get(index).copied()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id(), self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Complete,
    Current,
    Upcoming,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Complete => "complete",
            StepStatus::Current => "current",
            StepStatus::Upcoming => "upcoming",
        };
        f.write_str(s)
    }
}

/// Everything the user has chosen so far.
#[derive(Debug, Clone)]
pub struct WizardState {
    step: Step,
    pub selected_nodes: Vec<CustomNode>,
    pub workflow_nodes: Vec<CustomNode>,
    pub catalog_models: Vec<Model>,
    pub civitai_models: Vec<Model>,
    pub machine_name: String,
    pub gpu: Gpu,
    pub dependencies: Option<String>,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            step: Step::Nodes,
            selected_nodes: Vec::new(),
            workflow_nodes: Vec::new(),
            catalog_models: Vec::new(),
            civitai_models: Vec::new(),
            machine_name: String::new(),
            gpu: Gpu::default(),
            dependencies: None,
        }
    }
}

impl WizardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> Step {
        self.step
    }

    /// Status of `step` relative to the current one.
    pub fn status(&self, step: Step) -> StepStatus {
        match step.index().cmp(&self.step.index()) {
            std::cmp::Ordering::Less => StepStatus::Complete,
            std::cmp::Ordering::Equal => StepStatus::Current,
            std::cmp::Ordering::Greater => StepStatus::Upcoming,
        }
    }

    pub fn statuses(&self) -> [(Step, StepStatus); 3] {
        Step::ALL.map(|step| (step, self.status(step)))
    }

    /// Advances one step; stays put on the last one.
    pub fn next(&mut self) -> Step {
        if let Some(step) = Step::from_index(self.step.index() + 1) {
            self.step = step;
        }
        self.step
    }

    /// Goes back one step; stays put on the first one.
    pub fn back(&mut self) -> Step {
        if let Some(index) = self.step.index().checked_sub(1) {
            self.step = Step::ALL[index];
        }
        self.step
    }

    pub fn go_to(&mut self, step: Step) {
        self.step = step;
    }

    /// Adds the node, or removes it when already selected. Returns whether
    /// the node is selected afterwards.
    pub fn toggle_custom_node(&mut self, node: CustomNode) -> bool {
        toggle(&mut self.selected_nodes, node, CustomNode::identity)
    }

    /// Replaces the nodes extracted from an uploaded workflow.
    pub fn set_workflow_nodes(&mut self, nodes: Vec<CustomNode>) {
        self.workflow_nodes = nodes;
    }

    pub fn toggle_catalog_model(&mut self, model: Model) -> bool {
        toggle(&mut self.catalog_models, model, Model::identity)
    }

    pub fn toggle_civitai_model(&mut self, model: Model) -> bool {
        toggle(&mut self.civitai_models, model, Model::identity)
    }

    pub fn set_machine_name(&mut self, name: impl Into<String>) {
        self.machine_name = name.into().trim().to_string();
    }

    pub fn set_gpu(&mut self, gpu: Gpu) {
        self.gpu = gpu;
    }

    /// Blank input clears the dependencies.
    pub fn set_dependencies(&mut self, dependencies: impl Into<String>) {
        let dependencies = dependencies.into();
        self.dependencies = if dependencies.trim().is_empty() {
            None
        } else {
            Some(dependencies)
        };
    }

    /// Manual selections followed by workflow nodes, without duplicate
    /// references.
    pub fn all_custom_nodes(&self) -> Vec<&CustomNode> {
        let mut seen = std::collections::HashSet::new();
        self.selected_nodes
            .iter()
            .chain(self.workflow_nodes.iter())
            .filter(|node| seen.insert(node.reference.as_str()))
            .collect()
    }

    pub fn is_node_selected(&self, node: &CustomNode) -> bool {
        self.selected_nodes.iter().any(|n| n.identity() == node.identity())
    }

    pub fn is_catalog_model_selected(&self, model: &Model) -> bool {
        self.catalog_models.iter().any(|m| m.identity() == model.identity())
    }

    pub fn is_civitai_model_selected(&self, model: &Model) -> bool {
        self.civitai_models.iter().any(|m| m.identity() == model.identity())
    }

    /// Civitai models first, then catalog models.
    pub fn all_models(&self) -> impl Iterator<Item = &Model> {
        self.civitai_models.iter().chain(self.catalog_models.iter())
    }
}

fn toggle<T, K: PartialEq>(items: &mut Vec<T>, item: T, key: impl Fn(&T) -> K) -> bool {
    let wanted = key(&item);
    if let Some(position) = items.iter().position(|existing| key(existing) == wanted) {
        items.remove(position);
        false
    } else {
        items.push(item);
        true
    }
}
