use super::WizardState;
use crate::types::{CreateMachineRequest, CustomNodeState, CustomNodesPayload, Model, ModelPayload};

/// ComfyUI models directory for a model type.
pub fn model_directory(model_type: &str) -> String {
    let lowered = model_type.trim().to_lowercase();
    let directory = match lowered.as_str() {
        "checkpoint" | "checkpoints" => "checkpoints",
        "lora" | "loras" | "locon" | "lycoris" => "loras",
        "vae" => "vae",
        "upscale" | "upscaler" | "upscale_models" => "upscale_models",
        "textualinversion" | "embedding" | "embeddings" | "ti" => "embeddings",
        "controlnet" => "controlnet",
        "clip" => "clip",
        "clip_vision" => "clip_vision",
        "unet" => "unet",
        "hypernetwork" | "hypernetworks" => "hypernetworks",
        "gligen" => "gligen",
        _ => return lowered,
    };
    directory.to_string()
}

fn model_payload(model: &Model) -> ModelPayload {
    let path = if model.save_path.is_empty() || model.save_path == "default" {
        model_directory(&model.model_type)
    } else {
        model.save_path.clone()
    };
    ModelPayload {
        name: model.name.clone(),
        url: model.url.clone(),
        path,
    }
}

impl WizardState {
    /// The body sent to `/create-machine` (and `/app`).
    pub fn build_request(&self) -> CreateMachineRequest {
        let mut custom_nodes = CustomNodesPayload::default();
        for node in self.all_custom_nodes() {
            custom_nodes
                .custom_nodes
                .insert(node.reference.clone(), CustomNodeState::not_installed());
        }

        CreateMachineRequest {
            machine_name: self.machine_name.clone(),
            gpu: self.gpu,
            custom_nodes,
            models: self.all_models().map(model_payload).collect(),
            additional_dependencies: self.dependencies.clone(),
        }
    }
}
