use axum::Json;

use crate::model::SuccessBody;

/// `GET /api/v1`: health probe; requires no key.
pub async fn get_status() -> Json<SuccessBody> {
    Json(SuccessBody::new("all systems green"))
}
