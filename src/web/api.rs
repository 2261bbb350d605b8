//! This module defines the JSON routes of the proxy server.
use super::WebState;
use crate::api::apps::{filter_apps, AppStateFilter};
use crate::error::ApiError;
use crate::types::{CreateAppResponse, CreateMachineRequest, CreateMachineResponse};
use axum::body::Bytes;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

/// Body of every failed request.
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: u16, message: impl Into<String>) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Maps an upstream failure to a response, using `transport_status` when the
/// upstream never answered.
fn upstream_failure(err: &ApiError, fallback: &str, transport_status: u16) -> Response {
    error!("{}: {}", fallback, err);
    let (status, message) = err.client_facing(fallback);
    match err {
        ApiError::Status { .. } | ApiError::NoCustomNodes => error_response(status, message),
        _ => error_response(transport_status, message),
    }
}

/// Any failure, upstream status included, is reported as a 500 with `message`.
fn internal_failure(err: &ApiError, message: &str) -> Response {
    error!("{}: {}", message, err);
    error_response(500, message)
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[derive(Deserialize)]
pub struct AppsQuery {
    state: Option<String>,
}

#[derive(Deserialize)]
pub struct FilesQuery {
    #[serde(default)]
    path: String,
}

#[derive(Serialize)]
struct DeleteAppResponse {
    app_id: String,
}

/// Returns both catalog lists, bundled ones standing in for unreachable lists.
#[axum::debug_handler]
pub async fn get_catalog(State(state): State<Arc<WebState>>) -> impl IntoResponse {
    Json(state.catalog.load().await)
}

/// Searches Civitai for models.
#[axum::debug_handler]
pub async fn civitai_search(
    State(state): State<Arc<WebState>>,
    Query(query): Query<SearchQuery>,
) -> Response {
    match state.search.search(query.q.trim()).await {
        Ok(models) => Json(models).into_response(),
        Err(e) => upstream_failure(&e, "Unable to search Civitai", 500),
    }
}

#[axum::debug_handler]
pub async fn create_machine(
    State(state): State<Arc<WebState>>,
    Json(request): Json<CreateMachineRequest>,
) -> Response {
    match state.api.create_machine(&request).await {
        Ok(machine_id) => Json(CreateMachineResponse { machine_id }).into_response(),
        Err(e) => upstream_failure(&e, "Unable to create machine", 400),
    }
}

#[axum::debug_handler]
pub async fn create_app(
    State(state): State<Arc<WebState>>,
    Json(request): Json<CreateMachineRequest>,
) -> Response {
    match state.api.create_app(&request).await {
        Ok(task_id) => Json(CreateAppResponse { task_id }).into_response(),
        Err(e) => upstream_failure(&e, "Unable to create app", 400),
    }
}

/// Lists apps, optionally only those in one state (`deployed` or `stopped`).
#[axum::debug_handler]
pub async fn list_apps(
    State(state): State<Arc<WebState>>,
    Query(query): Query<AppsQuery>,
) -> Response {
    let filter = match query.state.as_deref() {
        None | Some("") | Some("all") => None,
        Some("deployed") => Some(AppStateFilter::Deployed),
        Some("stopped") => Some(AppStateFilter::Stopped),
        Some(other) => return error_response(400, format!("Unknown app state '{}'", other)),
    };

    match state.api.list_apps().await {
        Ok(apps) => match filter {
            Some(filter) => {
                let apps: Vec<_> = filter_apps(&apps, filter).into_iter().cloned().collect();
                Json(apps).into_response()
            }
            None => Json(apps).into_response(),
        },
        Err(e) => upstream_failure(&e, "Unable to fetch list of apps", 500),
    }
}

#[axum::debug_handler]
pub async fn delete_app(
    State(state): State<Arc<WebState>>,
    Path(app_id): Path<String>,
) -> Response {
    match state.api.delete_app(&app_id).await {
        Ok(app_id) => Json(DeleteAppResponse { app_id }).into_response(),
        Err(e) => upstream_failure(&e, "Unable to delete app", 500),
    }
}

/// Lists a directory of the shared models volume.
#[axum::debug_handler]
pub async fn list_model_files(
    State(state): State<Arc<WebState>>,
    Query(query): Query<FilesQuery>,
) -> Response {
    match state.api.list_model_files(&query.path).await {
        Ok(items) => Json(items).into_response(),
        Err(e) => internal_failure(&e, "Failed to fetch items"),
    }
}

#[axum::debug_handler]
pub async fn workflow_urls(
    State(state): State<Arc<WebState>>,
    Path(app_name): Path<String>,
) -> Response {
    match state.api.workflow_urls(&app_name).await {
        Ok(urls) => Json(urls).into_response(),
        Err(e) => internal_failure(&e, "Failed to load edit workflow URL"),
    }
}

/// Extracts the custom nodes a workflow file depends on.
///
/// Expects a multipart body with the workflow in a `file` field.
#[axum::debug_handler]
pub async fn upload_workflow_file(
    State(state): State<Arc<WebState>>,
    mut multipart: Multipart,
) -> Response {
    let mut upload: Option<(String, Bytes)> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(400, format!("Invalid upload: {}", e)),
        };
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("workflow.json").to_string();
        match field.bytes().await {
            Ok(contents) => upload = Some((file_name, contents)),
            Err(e) => return error_response(400, format!("Invalid upload: {}", e)),
        }
    }

    let Some((file_name, contents)) = upload else {
        return error_response(400, "No workflow file in the upload");
    };

    match state
        .api
        .generate_custom_nodes(&file_name, contents.to_vec())
        .await
    {
        Ok(nodes) => Json(nodes).into_response(),
        Err(e) => upstream_failure(&e, "Unable to fetch custom nodes from workflow file", 500),
    }
}
