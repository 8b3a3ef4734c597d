//! Key routes. Reading a key's own metadata needs only the key; creating,
//! listing, and deleting keys are admin operations.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use crate::model::{Key, SuccessBody};
use crate::web::middleware::access_key;
use crate::web::response_types::{ApiError, ApiResult};
use crate::web::AppState;

/// `GET /key`: id, display name, and usage counter for the calling key.
pub async fn get_key(State(state): State<AppState>, headers: HeaderMap) -> Json<Key> {
    let key = access_key(&headers);
    Json(state.api.get_key(&key).await)
}

/// `POST /key` (admin): create a key, or rename an existing one. The body
/// may be omitted entirely to mint a random key. Returns the key ID as text.
pub async fn post_key(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<String> {
    let key: Key = if body.is_empty() {
        Key::default()
    } else {
        serde_json::from_str(&body).map_err(|e| ApiError(e.into()))?
    };
    let id = state.api.create_key(&key.id, &key.name).await?;
    Ok(id)
}

/// `GET /key/all` (admin): every key ID known to the store.
pub async fn list_keys(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.api.list_keys().await?))
}

/// `DELETE /key` (admin): delete the key named by `x-access-key` and purge
/// everything stored under it.
pub async fn delete_key(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<SuccessBody>> {
    let key = access_key(&headers);
    if key.is_empty() {
        return Err(ApiError(crate::error::HoustonError::KeyNotProvided));
    }
    state.api.delete_key(&key).await?;
    Ok(Json(SuccessBody::new(format!("Deleted key {key}"))))
}
