use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A custom node entry as published in the ComfyUI-Manager node list.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct CustomNode {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub title: String,
    pub reference: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub install_type: String,
    #[serde(default)]
    pub description: String,
}

impl CustomNode {
    /// A node extracted from a workflow file only carries its repository url.
    pub fn from_reference(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            ..Self::default()
        }
    }

    pub fn identity(&self) -> String {
        format!("{}{}", self.reference, self.title)
    }

    pub fn display_name(&self) -> &str {
        if self.title.is_empty() {
            &self.reference
        } else {
            &self.title
        }
    }
}

/// A downloadable model, either from the ComfyUI-Manager list or from Civitai.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Model {
    pub name: String,
    #[serde(rename = "type", default)]
    pub model_type: String,
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub save_path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub filename: String,
    pub url: String,
}

impl Model {
    pub fn identity(&self) -> String {
        format!("{}{}", self.url, self.name)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Gpu {
    #[default]
    #[serde(rename = "any")]
    Any,
    #[serde(rename = "t4")]
    T4,
    #[serde(rename = "l4")]
    L4,
    #[serde(rename = "a10g")]
    A10G,
    #[serde(rename = "a100-40gb")]
    A100Small,
    #[serde(rename = "a100-80gb")]
    A100Big,
    #[serde(rename = "h100")]
    H100,
}

impl Gpu {
    pub const ALL: [Gpu; 7] = [
        Gpu::Any,
        Gpu::T4,
        Gpu::L4,
        Gpu::A10G,
        Gpu::A100Small,
        Gpu::A100Big,
        Gpu::H100,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gpu::Any => "any",
            Gpu::T4 => "t4",
            Gpu::L4 => "l4",
            Gpu::A10G => "a10g",
            Gpu::A100Small => "a100-40gb",
            Gpu::A100Big => "a100-80gb",
            Gpu::H100 => "h100",
        }
    }
}

impl fmt::Display for Gpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gpu {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Gpu::ALL
            .into_iter()
            .find(|gpu| gpu.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Gpu::ALL.iter().map(Gpu::as_str).collect();
                format!("unknown GPU '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CustomNodeState {
    pub state: String,
    pub hash: String,
}

impl CustomNodeState {
    pub fn not_installed() -> Self {
        Self {
            state: "not-installed".to_string(),
            hash: String::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct CustomNodesPayload {
    pub custom_nodes: BTreeMap<String, CustomNodeState>,
    pub unknown_nodes: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ModelPayload {
    pub name: String,
    pub url: String,
    pub path: String,
}

/// Body of both `/create-machine` and `/app`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CreateMachineRequest {
    pub machine_name: String,
    pub gpu: Gpu,
    pub custom_nodes: CustomNodesPayload,
    pub models: Vec<ModelPayload>,
    pub additional_dependencies: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateMachineResponse {
    pub machine_id: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateAppResponse {
    pub task_id: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct App {
    pub app_id: String,
    pub description: String,
    pub state: String,
    pub tasks: String,
    pub created_at: String,
    #[serde(default)]
    pub stopped_at: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Dir,
    File,
}

/// One entry of the remote models directory listing.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileSystemItem {
    #[serde(rename = "Filename")]
    pub filename: String,
    #[serde(rename = "Type")]
    pub kind: FileKind,
    #[serde(rename = "Size", default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl FileSystemItem {
    pub fn base_name(&self) -> &str {
        self.filename.rsplit('/').next().unwrap_or(&self.filename)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct WorkflowUrls {
    pub edit_url: String,
    pub run_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_uses_backend_wire_names() {
        let json = serde_json::to_string(&Gpu::A100Big).unwrap();
        assert_eq!(json, "\"a100-80gb\"");
        assert_eq!("H100".parse::<Gpu>().unwrap(), Gpu::H100);
        assert!("v100".parse::<Gpu>().is_err());
    }

    #[test]
    fn file_items_use_capitalized_fields() {
        let items: Vec<FileSystemItem> = serde_json::from_str(
            r#"[{"Filename":"checkpoints/sd.safetensors","Type":"file","Size":"2 GB"},
                {"Filename":"loras","Type":"dir"}]"#,
        )
        .unwrap();
        assert_eq!(items[0].base_name(), "sd.safetensors");
        assert_eq!(items[0].size.as_deref(), Some("2 GB"));
        assert_eq!(items[1].kind, FileKind::Dir);
    }

    #[test]
    fn model_type_field_is_renamed() {
        let model: Model = serde_json::from_str(
            r#"{"name":"vae","type":"VAE","url":"https://example.com/vae.pt"}"#,
        )
        .unwrap();
        assert_eq!(model.model_type, "VAE");
        assert!(model.save_path.is_empty());
    }
}
