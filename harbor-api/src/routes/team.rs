//! Team REST API Routes
//!
//! A Team is the root of its partition: deleting one removes everything
//! under it unless `recurse=false` is passed.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json,
};
use harbor_core::{EntityId, Team};
use harbor_storage::HarborDbClient;
use serde::Deserialize;

use super::member::CreateMemberRequest;
use super::project::CreateProjectRequest;
use super::{blocking, ApiJson, ApiQuery, id_or_new, keyed, DeleteResponse, ScopeParams};
use crate::error::ApiResult;
use crate::state::AppState;

// ============================================================================
// REQUEST TYPES
// ============================================================================

/// Body of `POST /teams`. Nested lists are created when `children=true`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeamRequest {
    pub team_id: Option<EntityId>,
    pub name: String,
    #[serde(default)]
    pub projects: Vec<CreateProjectRequest>,
    #[serde(default)]
    pub members: Vec<CreateMemberRequest>,
}

impl CreateTeamRequest {
    pub fn into_team(self) -> Team {
        let team_id = id_or_new(self.team_id);
        let mut team = Team::new(team_id.clone(), self.name);
        for project in self.projects {
            team = team.with_project(project.into_project(&team_id));
        }
        for member in self.members {
            team = team.with_member(member.into_member(&team_id));
        }
        team
    }
}

/// Body of `PUT /teams/{teamId}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTeamRequest {
    pub name: Option<String>,
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /teams - List all teams
pub async fn list_teams(
    State(client): State<HarborDbClient>,
    ApiQuery(params): ApiQuery<ScopeParams>,
) -> ApiResult<impl IntoResponse> {
    let teams = blocking(&client, move |c| c.list_teams(params.children)).await?;
    Ok(Json(teams))
}

/// POST /teams - Create a team
pub async fn create_team(
    State(client): State<HarborDbClient>,
    ApiQuery(params): ApiQuery<ScopeParams>,
    ApiJson(req): ApiJson<CreateTeamRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut team = req.into_team();
    if !params.children {
        team = Team::new(team.team_id, team.name);
    }
    let created = team.clone();
    blocking(&client, move |c| c.create(&team, params.children)).await?;
    Ok((StatusCode::CREATED, Json(keyed(created))))
}

/// GET /teams/{teamId} - Get a team
pub async fn get_team(
    State(client): State<HarborDbClient>,
    Path(team_id): Path<EntityId>,
    ApiQuery(params): ApiQuery<ScopeParams>,
) -> ApiResult<impl IntoResponse> {
    let team: Team = blocking(&client, move |c| {
        if params.children {
            c.get_with_children(&team_id, &team_id)
        } else {
            c.get(&team_id, &team_id)
        }
    })
    .await?;
    Ok(Json(keyed(team)))
}

/// PUT /teams/{teamId} - Update a team
pub async fn update_team(
    State(client): State<HarborDbClient>,
    Path(team_id): Path<EntityId>,
    ApiJson(req): ApiJson<UpdateTeamRequest>,
) -> ApiResult<impl IntoResponse> {
    let team = blocking(&client, move |c| {
        let mut team: Team = c.get(&team_id, &team_id)?;
        if let Some(name) = req.name {
            team.name = name;
        }
        c.update(&team)
    })
    .await?;
    Ok(Json(keyed(team)))
}

/// DELETE /teams/{teamId} - Delete a team and, by default, its subtree
pub async fn delete_team(
    State(client): State<HarborDbClient>,
    Path(team_id): Path<EntityId>,
    ApiQuery(params): ApiQuery<ScopeParams>,
) -> ApiResult<impl IntoResponse> {
    let recurse = params.recurse.unwrap_or(true);
    let deleted = blocking(&client, move |c| {
        c.delete::<Team>(&team_id, &team_id, recurse)
    })
    .await?;
    Ok(Json(DeleteResponse { deleted }))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

pub fn create_router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/teams", get(list_teams).post(create_team))
        .route(
            "/teams/:team_id",
            get(get_team).put(update_team).delete(delete_team),
        )
}
