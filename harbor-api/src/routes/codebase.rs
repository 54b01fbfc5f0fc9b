//! Codebase REST API Routes
//!
//! Codebase ids are team-scoped, so single-codebase routes only need
//! `teamId`. `projectId` narrows listings and is fixed after creation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json,
};
use harbor_core::{BuildTool, Codebase, EntityId, EntityRef, EntityType, Language};
use harbor_storage::HarborDbClient;
use serde::Deserialize;

use super::{blocking, ApiJson, ApiQuery, id_or_new, keyed, DeleteResponse, ScopeParams};
use crate::error::ApiResult;
use crate::state::AppState;

/// Body of `POST /codebases`, also nested in project creation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCodebaseRequest {
    pub codebase_id: Option<EntityId>,
    pub name: String,
    pub language: Language,
    pub build_tool: BuildTool,
}

impl CreateCodebaseRequest {
    pub fn into_codebase(self, team_id: &str, project_id: &str) -> Codebase {
        Codebase::new(
            team_id,
            project_id,
            id_or_new(self.codebase_id),
            self.name,
            self.language,
            self.build_tool,
        )
    }
}

/// Body of `PUT /codebases/{codebaseId}`. A `projectId` different from the
/// stored one is rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCodebaseRequest {
    pub project_id: Option<EntityId>,
    pub name: Option<String>,
    pub language: Option<Language>,
    pub build_tool: Option<BuildTool>,
}

impl UpdateCodebaseRequest {
    fn apply(self, codebase: &mut Codebase) {
        if let Some(project_id) = self.project_id {
            codebase.project_id = project_id;
        }
        if let Some(name) = self.name {
            codebase.name = name;
        }
        if let Some(language) = self.language {
            codebase.language = language;
        }
        if let Some(build_tool) = self.build_tool {
            codebase.build_tool = build_tool;
        }
    }
}

/// GET /codebases?teamId=&projectId= - List codebases
pub async fn list_codebases(
    State(client): State<HarborDbClient>,
    ApiQuery(params): ApiQuery<ScopeParams>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let project_id = params.project_id.clone().filter(|id| !id.is_empty());
    let codebases = blocking(&client, move |c| match project_id {
        Some(project_id) => c.get_all_under::<Codebase>(
            &EntityRef::new(EntityType::Project, team_id, project_id),
            false,
        ),
        None => c.get_all::<Codebase>(&team_id, false),
    })
    .await?;
    Ok(Json(codebases))
}

/// POST /codebases?teamId=&projectId= - Create a codebase
pub async fn create_codebase(
    State(client): State<HarborDbClient>,
    ApiQuery(params): ApiQuery<ScopeParams>,
    ApiJson(req): ApiJson<CreateCodebaseRequest>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let project_id = params.project_id()?;
    let codebase = req.into_codebase(&team_id, &project_id);
    let created = codebase.clone();
    blocking(&client, move |c| c.create(&codebase, false)).await?;
    Ok((StatusCode::CREATED, Json(keyed(created))))
}

/// GET /codebases/{codebaseId}?teamId= - Get a codebase
pub async fn get_codebase(
    State(client): State<HarborDbClient>,
    Path(codebase_id): Path<EntityId>,
    ApiQuery(params): ApiQuery<ScopeParams>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let codebase: Codebase =
        blocking(&client, move |c| c.get(&team_id, &codebase_id)).await?;
    Ok(Json(keyed(codebase)))
}

/// PUT /codebases/{codebaseId}?teamId= - Update a codebase
pub async fn update_codebase(
    State(client): State<HarborDbClient>,
    Path(codebase_id): Path<EntityId>,
    ApiQuery(params): ApiQuery<ScopeParams>,
    ApiJson(req): ApiJson<UpdateCodebaseRequest>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let codebase = blocking(&client, move |c| {
        let mut codebase: Codebase = c.get(&team_id, &codebase_id)?;
        req.apply(&mut codebase);
        c.update(&codebase)
    })
    .await?;
    Ok(Json(keyed(codebase)))
}

/// DELETE /codebases/{codebaseId}?teamId= - Delete a codebase
pub async fn delete_codebase(
    State(client): State<HarborDbClient>,
    Path(codebase_id): Path<EntityId>,
    ApiQuery(params): ApiQuery<ScopeParams>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let deleted = blocking(&client, move |c| {
        c.delete::<Codebase>(&team_id, &codebase_id, false)
    })
    .await?;
    Ok(Json(DeleteResponse { deleted }))
}

pub fn create_router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/codebases", get(list_codebases).post(create_codebase))
        .route(
            "/codebases/:codebase_id",
            get(get_codebase).put(update_codebase).delete(delete_codebase),
        )
}
