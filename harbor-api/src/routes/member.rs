//! Team Member REST API Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json,
};
use harbor_core::{EntityId, Member};
use harbor_storage::HarborDbClient;
use serde::Deserialize;

use super::{blocking, ApiJson, ApiQuery, id_or_new, keyed, DeleteResponse, ScopeParams};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemberRequest {
    pub member_id: Option<EntityId>,
    pub email: String,
    #[serde(default)]
    pub is_team_lead: bool,
}

impl CreateMemberRequest {
    pub fn into_member(self, team_id: &str) -> Member {
        Member::new(
            team_id,
            id_or_new(self.member_id),
            self.email,
            self.is_team_lead,
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberRequest {
    pub email: Option<String>,
    pub is_team_lead: Option<bool>,
}

/// GET /members?teamId=
pub async fn list_members(
    State(client): State<HarborDbClient>,
    ApiQuery(params): ApiQuery<ScopeParams>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let members = blocking(&client, move |c| c.get_all::<Member>(&team_id, false)).await?;
    Ok(Json(members))
}

/// POST /members?teamId=
pub async fn create_member(
    State(client): State<HarborDbClient>,
    ApiQuery(params): ApiQuery<ScopeParams>,
    ApiJson(req): ApiJson<CreateMemberRequest>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let member = req.into_member(&team_id);
    let created = member.clone();
    blocking(&client, move |c| c.create(&member, false)).await?;
    Ok((StatusCode::CREATED, Json(keyed(created))))
}

/// GET /members/{memberId}?teamId=
pub async fn get_member(
    State(client): State<HarborDbClient>,
    Path(member_id): Path<EntityId>,
    ApiQuery(params): ApiQuery<ScopeParams>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let member: Member = blocking(&client, move |c| c.get(&team_id, &member_id)).await?;
    Ok(Json(keyed(member)))
}

/// PUT /members/{memberId}?teamId=
pub async fn update_member(
    State(client): State<HarborDbClient>,
    Path(member_id): Path<EntityId>,
    ApiQuery(params): ApiQuery<ScopeParams>,
    ApiJson(req): ApiJson<UpdateMemberRequest>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let member = blocking(&client, move |c| {
        let mut member: Member = c.get(&team_id, &member_id)?;
        if let Some(email) = req.email {
            member.email = email;
        }
        if let Some(is_team_lead) = req.is_team_lead {
            member.is_team_lead = is_team_lead;
        }
        c.update(&member)
    })
    .await?;
    Ok(Json(keyed(member)))
}

/// DELETE /members/{memberId}?teamId=
pub async fn delete_member(
    State(client): State<HarborDbClient>,
    Path(member_id): Path<EntityId>,
    ApiQuery(params): ApiQuery<ScopeParams>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let deleted = blocking(&client, move |c| {
        c.delete::<Member>(&team_id, &member_id, false)
    })
    .await?;
    Ok(Json(DeleteResponse { deleted }))
}

pub fn create_router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/members", get(list_members).post(create_member))
        .route(
            "/members/:member_id",
            get(get_member).put(update_member).delete(delete_member),
        )
}
