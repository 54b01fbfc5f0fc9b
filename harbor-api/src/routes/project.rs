//! Project REST API Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json,
};
use harbor_core::{EntityId, Project};
use harbor_storage::HarborDbClient;
use serde::Deserialize;

use super::codebase::CreateCodebaseRequest;
use super::{blocking, ApiJson, ApiQuery, id_or_new, keyed, DeleteResponse, ScopeParams};
use crate::error::ApiResult;
use crate::state::AppState;

/// Body of `POST /projects`, also nested in `POST /teams`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub project_id: Option<EntityId>,
    pub name: String,
    #[serde(default)]
    pub codebases: Vec<CreateCodebaseRequest>,
}

impl CreateProjectRequest {
    pub fn into_project(self, team_id: &str) -> Project {
        let project_id = id_or_new(self.project_id);
        let mut project = Project::new(team_id, project_id.clone(), self.name);
        for codebase in self.codebases {
            project = project.with_codebase(codebase.into_codebase(team_id, &project_id));
        }
        project
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
}

/// GET /projects?teamId= - List a team's projects
pub async fn list_projects(
    State(client): State<HarborDbClient>,
    ApiQuery(params): ApiQuery<ScopeParams>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let projects =
        blocking(&client, move |c| c.get_all::<Project>(&team_id, params.children)).await?;
    Ok(Json(projects))
}

/// POST /projects?teamId= - Create a project
pub async fn create_project(
    State(client): State<HarborDbClient>,
    ApiQuery(params): ApiQuery<ScopeParams>,
    ApiJson(req): ApiJson<CreateProjectRequest>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let mut project = req.into_project(&team_id);
    if !params.children {
        project.codebases.clear();
    }
    let created = project.clone();
    blocking(&client, move |c| c.create(&project, params.children)).await?;
    Ok((StatusCode::CREATED, Json(keyed(created))))
}

/// GET /projects/{projectId}?teamId= - Get a project
pub async fn get_project(
    State(client): State<HarborDbClient>,
    Path(project_id): Path<EntityId>,
    ApiQuery(params): ApiQuery<ScopeParams>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let project: Project = blocking(&client, move |c| {
        if params.children {
            c.get_with_children(&team_id, &project_id)
        } else {
            c.get(&team_id, &project_id)
        }
    })
    .await?;
    Ok(Json(keyed(project)))
}

/// PUT /projects/{projectId}?teamId= - Update a project
pub async fn update_project(
    State(client): State<HarborDbClient>,
    Path(project_id): Path<EntityId>,
    ApiQuery(params): ApiQuery<ScopeParams>,
    ApiJson(req): ApiJson<UpdateProjectRequest>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let project = blocking(&client, move |c| {
        let mut project: Project = c.get(&team_id, &project_id)?;
        if let Some(name) = req.name {
            project.name = name;
        }
        c.update(&project)
    })
    .await?;
    Ok(Json(keyed(project)))
}

/// DELETE /projects/{projectId}?teamId= - Delete a project
pub async fn delete_project(
    State(client): State<HarborDbClient>,
    Path(project_id): Path<EntityId>,
    ApiQuery(params): ApiQuery<ScopeParams>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let recurse = params.recurse.unwrap_or(false);
    let deleted = blocking(&client, move |c| {
        c.delete::<Project>(&team_id, &project_id, recurse)
    })
    .await?;
    Ok(Json(DeleteResponse { deleted }))
}

pub fn create_router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:project_id",
            get(get_project).put(update_project).delete(delete_project),
        )
}
