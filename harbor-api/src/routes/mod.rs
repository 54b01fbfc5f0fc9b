//! REST API Routes
//!
//! One module per entity kind. Every response body is a map keyed by
//! entity id, including single-entity reads.

use std::collections::BTreeMap;

use axum::extract::{FromRequest, FromRequestParts};
use axum::Router;
use harbor_core::{new_entity_id, EntityId, HarborEntity, HarborResult};
use harbor_storage::HarborDbClient;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub mod codebase;
pub mod health;
pub mod member;
pub mod project;
pub mod team;
pub mod token;

// ============================================================================
// EXTRACTORS
// ============================================================================

/// `Json` whose rejection is an [`ApiError`] body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query` whose rejection is an [`ApiError`] body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

// ============================================================================
// SHARED REQUEST/RESPONSE TYPES
// ============================================================================

/// Query parameters shared by every entity route.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeParams {
    pub team_id: Option<EntityId>,
    pub project_id: Option<EntityId>,
    /// Embed descendants on reads; cascade on creates.
    #[serde(default)]
    pub children: bool,
    /// Cascade on deletes. Defaults per route.
    pub recurse: Option<bool>,
}

impl ScopeParams {
    pub fn team_id(&self) -> ApiResult<EntityId> {
        required(&self.team_id, "teamId")
    }

    pub fn project_id(&self) -> ApiResult<EntityId> {
        required(&self.project_id, "projectId")
    }
}

fn required(value: &Option<EntityId>, field: &str) -> ApiResult<EntityId> {
    value
        .as_ref()
        .filter(|id| !id.is_empty())
        .cloned()
        .ok_or_else(|| ApiError::missing_field(field))
}

/// Response body of every DELETE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: u64,
}

/// Map keyed by entity id.
pub type Keyed<T> = BTreeMap<EntityId, T>;

pub fn keyed<T: HarborEntity>(entity: T) -> Keyed<T> {
    let mut map = Keyed::new();
    map.insert(entity.entity_id().to_string(), entity);
    map
}

/// Caller-supplied id, or a fresh UUIDv7.
pub fn id_or_new(id: Option<EntityId>) -> EntityId {
    id.filter(|id| !id.is_empty()).unwrap_or_else(new_entity_id)
}

/// Run a synchronous client call on the blocking pool.
pub async fn blocking<R, F>(client: &HarborDbClient, op: F) -> ApiResult<R>
where
    F: FnOnce(&HarborDbClient) -> HarborResult<R> + Send + 'static,
    R: Send + 'static,
{
    let client = client.clone();
    Ok(tokio::task::spawn_blocking(move || op(&client)).await??)
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Build the full application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(team::create_router())
        .merge(project::create_router())
        .merge(codebase::create_router())
        .merge(member::create_router())
        .merge(token::create_router())
        .merge(health::create_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_params() {
        let params = ScopeParams {
            team_id: Some("t1".to_string()),
            project_id: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(params.team_id().ok(), Some("t1".to_string()));
        assert_eq!(
            params.project_id().map_err(|e| e.code),
            Err(crate::error::ErrorCode::MissingField)
        );
    }

    #[test]
    fn test_id_or_new() {
        assert_eq!(id_or_new(Some("given".to_string())), "given");
        assert!(!id_or_new(Some(String::new())).is_empty());
        assert_ne!(id_or_new(None), id_or_new(None));
    }
}
