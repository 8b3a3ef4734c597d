//! Mission routes: creation, retrieval, reports, deletion, and the
//! transactional stage state update.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;

use crate::mission;
use crate::model::{MissionCreateRequest, MissionCreatedResponse, StageStateUpdate, SuccessBody};
use crate::web::middleware::access_key;
use crate::web::response_types::{ApiError, ApiResult};
use crate::web::AppState;

/// `GET /missions/`: every active mission ID under the key.
pub async fn get_missions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<String>>> {
    let key = access_key(&headers);
    Ok(Json(state.api.all_active_missions(&key).await?))
}

/// `POST /missions`: create a mission from a saved plan name or an inline
/// plan, optionally with a caller-chosen ID.
pub async fn post_mission(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Json<MissionCreatedResponse>> {
    let key = access_key(&headers);
    let request: MissionCreateRequest =
        serde_json::from_str(&body).map_err(|e| ApiError(e.into()))?;
    let id = state
        .api
        .create_mission(&key, &request.plan, &request.id)
        .await?;
    Ok(Json(MissionCreatedResponse { id }))
}

/// `GET /missions/{id}`: the stored mission JSON, verbatim.
pub async fn get_mission(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let key = access_key(&headers);
    let mission_json = state.api.get_mission_json(&key, &id).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], mission_json))
}

/// `GET /missions/{id}/report`: text alternative to the dashboard.
pub async fn get_mission_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<SuccessBody>> {
    let key = access_key(&headers);
    let report = state.api.mission_report(&key, &id).await?;
    Ok(Json(SuccessBody::new(report)))
}

/// `DELETE /missions/{id}`: remove the mission and scrub the indices.
pub async fn delete_mission(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<SuccessBody>> {
    let key = access_key(&headers);
    state.api.delete_mission(&key, &id).await?;
    Ok(Json(SuccessBody::new(format!("Deleted {id}"))))
}

/// `POST /missions/{id}/stages/{name}`: the transactional stage update.
/// Returns 572 when the mission was concurrently modified three times in a
/// row, prompting the client to retry.
pub async fn post_mission_stage(
    State(state): State<AppState>,
    Path((id, stage_name)): Path<(String, String)>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Json<mission::Response>> {
    let key = access_key(&headers);
    let update: StageStateUpdate = serde_json::from_str(&body).map_err(|e| ApiError(e.into()))?;
    let response = state
        .api
        .update_stage_state(
            &key,
            &id,
            &stage_name,
            &update.state,
            update.ignore_dependencies,
        )
        .await?;
    Ok(Json(response))
}

/// `GET /completed`: completed-but-not-deleted mission IDs.
pub async fn get_completed_missions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<Vec<String>> {
    let key = access_key(&headers);
    Json(state.api.completed_missions(&key).await)
}
