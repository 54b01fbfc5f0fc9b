//! Team Token REST API Routes
//!
//! Tokens are issued by the server: the secret is random and the expiry
//! comes from `ApiConfig::token_ttl`.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json,
};
use chrono::Utc;
use harbor_core::{EntityId, Timestamp, Token};
use harbor_storage::HarborDbClient;
use serde::Deserialize;
use uuid::Uuid;

use super::{blocking, ApiJson, ApiQuery, id_or_new, keyed, DeleteResponse, ScopeParams};
use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenRequest {
    pub token_id: Option<EntityId>,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTokenRequest {
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub expires: Option<Timestamp>,
}

/// Random 64-character hex secret.
fn new_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// GET /tokens?teamId=
pub async fn list_tokens(
    State(client): State<HarborDbClient>,
    ApiQuery(params): ApiQuery<ScopeParams>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let tokens = blocking(&client, move |c| c.get_all::<Token>(&team_id, false)).await?;
    Ok(Json(tokens))
}

/// POST /tokens?teamId=
pub async fn create_token(
    State(client): State<HarborDbClient>,
    State(config): State<Arc<ApiConfig>>,
    ApiQuery(params): ApiQuery<ScopeParams>,
    ApiJson(req): ApiJson<CreateTokenRequest>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let created = Utc::now();
    let token = Token::new(
        team_id,
        id_or_new(req.token_id),
        req.name,
        new_secret(),
        created,
        created + config.token_ttl,
    );
    let issued = token.clone();
    blocking(&client, move |c| c.create(&token, false)).await?;
    Ok((StatusCode::CREATED, Json(keyed(issued))))
}

/// GET /tokens/{tokenId}?teamId=
pub async fn get_token(
    State(client): State<HarborDbClient>,
    Path(token_id): Path<EntityId>,
    ApiQuery(params): ApiQuery<ScopeParams>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let token: Token = blocking(&client, move |c| c.get(&team_id, &token_id)).await?;
    Ok(Json(keyed(token)))
}

/// PUT /tokens/{tokenId}?teamId=
pub async fn update_token(
    State(client): State<HarborDbClient>,
    Path(token_id): Path<EntityId>,
    ApiQuery(params): ApiQuery<ScopeParams>,
    ApiJson(req): ApiJson<UpdateTokenRequest>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let token = blocking(&client, move |c| {
        let mut token: Token = c.get(&team_id, &token_id)?;
        if let Some(name) = req.name {
            token.name = name;
        }
        if let Some(enabled) = req.enabled {
            token.enabled = enabled;
        }
        if let Some(expires) = req.expires {
            token.expires = expires;
        }
        c.update(&token)
    })
    .await?;
    Ok(Json(keyed(token)))
}

/// DELETE /tokens/{tokenId}?teamId=
pub async fn delete_token(
    State(client): State<HarborDbClient>,
    Path(token_id): Path<EntityId>,
    ApiQuery(params): ApiQuery<ScopeParams>,
) -> ApiResult<impl IntoResponse> {
    let team_id = params.team_id()?;
    let deleted = blocking(&client, move |c| {
        c.delete::<Token>(&team_id, &token_id, false)
    })
    .await?;
    Ok(Json(DeleteResponse { deleted }))
}

pub fn create_router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/tokens", get(list_tokens).post(create_token))
        .route(
            "/tokens/:token_id",
            get(get_token).put(update_token).delete(delete_token),
        )
}
