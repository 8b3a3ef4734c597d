//! Plan routes: save, fetch, list, delete, and the lifted-mission view.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;

use crate::model::{Plan, SuccessBody};
use crate::web::middleware::access_key;
use crate::web::response_types::{ApiError, ApiResult};
use crate::web::AppState;

/// `GET /plans/`: all plan names for the key.
pub async fn get_plans(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<String>>> {
    let key = access_key(&headers);
    Ok(Json(state.api.list_plans(&key).await?))
}

/// `POST /plans`: validate and save (or overwrite) a plan.
pub async fn post_plan(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<()> {
    let key = access_key(&headers);
    let plan: Plan = serde_json::from_str(&body).map_err(|e| ApiError(e.into()))?;
    state.api.save_plan(&key, plan).await?;
    Ok(())
}

/// `GET /plans/{name}`: the saved plan definition as JSON.
pub async fn get_plan(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let key = access_key(&headers);
    let plan_json = state.api.get_plan_json(&key, &name).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], plan_json))
}

/// `GET /plans/{name}/m`: the plan lifted into mission form, for clients
/// that render plans and missions alike.
pub async fn get_plan_as_mission(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let key = access_key(&headers);
    let mission = state.api.plan_as_mission(&key, &name).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], mission.to_json()))
}

/// `GET /plans/{name}/missions`: active mission IDs for the plan.
pub async fn get_plan_missions(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Json<Vec<String>> {
    let key = access_key(&headers);
    Json(state.api.active_missions(&key, &name).await)
}

/// `DELETE /plans/{name}`: delete the plan and cascade to its missions.
pub async fn delete_plan(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<SuccessBody>> {
    let key = access_key(&headers);
    state.api.delete_plan(&key, &name).await?;
    Ok(Json(SuccessBody::new(format!("Deleted {name}"))))
}
