//! Workspace endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, FieldError};
use crate::models::workspace::{role, Workspace, WorkspaceMember, WorkspaceSummary};
use crate::permissions;
use crate::realtime::emit;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/workspaces", get(list_workspaces).post(create_workspace))
        .route("/workspaces/{workspace_id}/join", post(join_workspace))
        .route("/workspaces/{workspace_id}/members", get(list_members))
}

// GET /api/v1/workspaces
async fn list_workspaces(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkspaceSummary>>, ApiError> {
    Ok(Json(state.store.list_user_workspaces(&user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: Option<String>,
}

// POST /api/v1/workspaces
async fn create_workspace(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateWorkspaceRequest>,
) -> Result<(StatusCode, Json<Workspace>), ApiError> {
    let name = body.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(ApiError::validation(vec![FieldError {
            field: "name".to_string(),
            message: "Workspace name must be 1 to 100 characters".to_string(),
        }]));
    }

    let workspace = state.store.create_workspace(name, &user_id).await?;
    tracing::info!(workspace_id = %workspace.id, owner_id = %user_id, "workspace created");

    Ok((StatusCode::CREATED, Json(workspace)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub workspace_id: String,
    pub user_id: String,
    pub joined: bool,
}

// POST /api/v1/workspaces/{workspace_id}/join
async fn join_workspace(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
) -> Result<Json<JoinResponse>, ApiError> {
    let workspace = state
        .store
        .find_workspace(&workspace_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Workspace not found"))?;

    let joined = state
        .store
        .add_workspace_member(&workspace.id, &user_id, role::MEMBER)
        .await?;
    if joined {
        emit::member_joined(&state.fanout, &workspace.id, &user_id);
    }

    Ok(Json(JoinResponse {
        workspace_id: workspace.id,
        user_id,
        joined,
    }))
}

// GET /api/v1/workspaces/{workspace_id}/members
async fn list_members(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
) -> Result<Json<Vec<WorkspaceMember>>, ApiError> {
    let workspace = permissions::require_member(state.store.as_ref(), &workspace_id, &user_id).await?;
    Ok(Json(state.store.list_workspace_members(&workspace.id).await?))
}
