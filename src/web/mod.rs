//! HTTP proxy exposing the provisioning, catalog and search operations as JSON.
mod api;

use crate::api::ProvisioningApi;
use crate::catalog::CatalogProvider;
use crate::search::ModelSearch;
use anyhow::Result;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Services shared by every request.
pub struct WebState {
    pub api: Arc<dyn ProvisioningApi>,
    pub catalog: CatalogProvider,
    pub search: Arc<dyn ModelSearch>,
}

pub fn router(state: Arc<WebState>) -> Router {
    Router::new()
        .route("/api/catalog", get(api::get_catalog))
        .route("/api/civitai-search", get(api::civitai_search))
        .route("/api/create-machine", post(api::create_machine))
        .route("/api/app", post(api::create_app))
        .route("/api/apps", get(api::list_apps))
        .route("/api/apps/:app", delete(api::delete_app))
        .route("/api/apps/:app/workflow-urls", get(api::workflow_urls))
        .route("/api/model-files", get(api::list_model_files))
        .route("/api/upload-workflow-file", post(api::upload_workflow_file))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

pub async fn start_server(state: Arc<WebState>, port: u16) -> Result<()> {
    let app = router(state);

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Proxy server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSource;
    use crate::error::ApiError;
    use crate::types::{
        App, CreateMachineRequest, CustomNode, FileKind, FileSystemItem, Model, WorkflowUrls,
    };
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    /// Answers from memory; every app-builder call fails with `status` when set.
    struct StubApi {
        failing_status: Option<u16>,
    }

    impl StubApi {
        fn check(&self, message: &str) -> Result<(), ApiError> {
            match self.failing_status {
                Some(status) => Err(ApiError::Status {
                    status,
                    message: message.to_string(),
                }),
                None => Ok(()),
            }
        }
    }

    fn app(id: &str, state: &str) -> App {
        App {
            app_id: id.to_string(),
            description: String::new(),
            state: state.to_string(),
            tasks: "0".to_string(),
            created_at: "2024-05-01T10:00:00Z".to_string(),
            stopped_at: None,
        }
    }

    #[async_trait]
    impl ProvisioningApi for StubApi {
        async fn create_machine(&self, request: &CreateMachineRequest) -> Result<String, ApiError> {
            self.check("Unable to create machine")?;
            Ok(format!("{}-1234", request.machine_name))
        }

        async fn create_app(&self, _request: &CreateMachineRequest) -> Result<String, ApiError> {
            Err(ApiError::NotConfigured("APP_BUILDER_API_BASE_URL"))
        }

        async fn list_apps(&self) -> Result<Vec<App>, ApiError> {
            self.check("Unable to fetch list of apps")?;
            Ok(vec![app("ap-1", "deployed"), app("ap-2", "stopped")])
        }

        async fn delete_app(&self, app_id: &str) -> Result<String, ApiError> {
            self.check("Unable to delete app")?;
            Ok(app_id.to_string())
        }

        async fn list_model_files(&self, path: &str) -> Result<Vec<FileSystemItem>, ApiError> {
            self.check("Failed to fetch items")?;
            Ok(vec![FileSystemItem {
                filename: format!("{}/sdxl.safetensors", path),
                kind: FileKind::File,
                size: Some("6.9 GB".to_string()),
            }])
        }

        async fn workflow_urls(&self, app_name: &str) -> Result<WorkflowUrls, ApiError> {
            self.check("Failed to load edit workflow URL")?;
            Ok(WorkflowUrls {
                edit_url: format!("https://edit.example.com/{}", app_name),
                run_url: format!("https://run.example.com/{}", app_name),
            })
        }

        async fn generate_custom_nodes(
            &self,
            _file_name: &str,
            contents: Vec<u8>,
        ) -> Result<Vec<CustomNode>, ApiError> {
            let workflow: Value = serde_json::from_slice(&contents)?;
            let references: Vec<CustomNode> = workflow["nodes"]
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|node| node["cnr_id"].as_str())
                .map(|reference| CustomNode {
                    reference: reference.to_string(),
                    ..CustomNode::default()
                })
                .collect();
            if references.is_empty() {
                return Err(ApiError::NoCustomNodes);
            }
            Ok(references)
        }
    }

    struct OfflineCatalog;

    #[async_trait]
    impl CatalogSource for OfflineCatalog {
        async fn fetch_custom_nodes(&self) -> Result<Vec<CustomNode>, ApiError> {
            Err(ApiError::NotConfigured("catalog"))
        }

        async fn fetch_models(&self) -> Result<Vec<Model>, ApiError> {
            Err(ApiError::NotConfigured("catalog"))
        }
    }

    struct EchoSearch;

    #[async_trait]
    impl ModelSearch for EchoSearch {
        async fn search(&self, query: &str) -> Result<Vec<Model>, ApiError> {
            Ok(vec![Model {
                name: query.to_string(),
                url: "https://civitai.com/api/download/models/1".to_string(),
                ..Model::default()
            }])
        }
    }

    fn test_router(failing_status: Option<u16>) -> Router {
        router(Arc::new(WebState {
            api: Arc::new(StubApi { failing_status }),
            catalog: CatalogProvider::new(Arc::new(OfflineCatalog)),
            search: Arc::new(EchoSearch),
        }))
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn catalog_falls_back_to_bundled_lists() {
        let (status, body) = send(test_router(None), get("/api/catalog")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["custom_nodes_origin"], "bundled");
        assert!(!body["custom_nodes"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_machine_returns_the_machine_id() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/create-machine")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "machine_name": "sdxl",
                    "gpu": "t4",
                    "custom_nodes": {"custom_nodes": {}, "unknown_nodes": []},
                    "models": [],
                    "additional_dependencies": null
                })
                .to_string(),
            ))
            .unwrap();
        let (status, body) = send(test_router(None), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"machine_id": "sdxl-1234"}));
    }

    #[tokio::test]
    async fn upstream_status_is_mirrored_in_error_body() {
        let request = Request::builder()
            .method("DELETE")
            .uri("/api/apps/ap-1")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(test_router(Some(404)), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Unable to delete app"}));
    }

    #[tokio::test]
    async fn create_app_transport_failure_is_a_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/app")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "machine_name": "sdxl",
                    "gpu": "any",
                    "custom_nodes": {"custom_nodes": {}, "unknown_nodes": []},
                    "models": [],
                    "additional_dependencies": "pip install onnx"
                })
                .to_string(),
            ))
            .unwrap();
        let (status, body) = send(test_router(None), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unable to create app");
    }

    #[tokio::test]
    async fn apps_can_be_filtered_by_state() {
        let (status, body) = send(test_router(None), get("/api/apps?state=stopped")).await;
        assert_eq!(status, StatusCode::OK);
        let apps = body.as_array().unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0]["app_id"], "ap-2");

        let (status, body) = send(test_router(None), get("/api/apps?state=paused")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("paused"));
    }

    #[tokio::test]
    async fn file_listing_and_workflow_urls_pass_through() {
        let (_, body) = send(test_router(None), get("/api/model-files?path=checkpoints")).await;
        assert_eq!(body[0]["Filename"], "checkpoints/sdxl.safetensors");
        assert_eq!(body[0]["Type"], "file");

        let (_, body) = send(test_router(None), get("/api/apps/my-app/workflow-urls")).await;
        assert_eq!(body["edit_url"], "https://edit.example.com/my-app");
    }

    #[tokio::test]
    async fn file_listing_and_workflow_urls_fail_with_500() {
        let (status, body) =
            send(test_router(Some(404)), get("/api/model-files?path=loras")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Failed to fetch items"}));

        let (status, body) =
            send(test_router(Some(403)), get("/api/apps/my-app/workflow-urls")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Failed to load edit workflow URL"}));
    }

    fn workflow_upload(workflow: &Value) -> Request<Body> {
        let body = format!(
            "--XBOUNDARY\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"workflow.json\"\r\n\
             Content-Type: application/json\r\n\r\n\
             {}\r\n\
             --XBOUNDARY--\r\n",
            workflow
        );
        Request::builder()
            .method("POST")
            .uri("/api/upload-workflow-file")
            .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn uploaded_workflow_yields_its_custom_nodes() {
        let workflow = json!({"nodes": [
            {"type": "KSampler"},
            {"type": "ImpactWildcard", "cnr_id": "https://github.com/ltdrdata/ComfyUI-Impact-Pack"}
        ]});
        let (status, body) = send(test_router(None), workflow_upload(&workflow)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body[0]["reference"],
            "https://github.com/ltdrdata/ComfyUI-Impact-Pack"
        );
    }

    #[tokio::test]
    async fn workflow_without_custom_nodes_is_rejected() {
        let workflow = json!({"nodes": [{"type": "KSampler"}]});
        let (status, body) = send(test_router(None), workflow_upload(&workflow)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "No custom nodes found in the uploaded workflow file"
        );

        let empty = Request::builder()
            .method("POST")
            .uri("/api/upload-workflow-file")
            .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from("--XBOUNDARY--\r\n"))
            .unwrap();
        let (status, _) = send(test_router(None), empty).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn civitai_search_uses_the_query() {
        let (status, body) = send(test_router(None), get("/api/civitai-search?q=anime")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "anime");
    }
}
