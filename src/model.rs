//! Wire types shared between the HTTP surface and the coordinator: plans as
//! submitted by clients, key metadata, and request/response bodies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A reusable workflow template. Plans are immutable once saved; missions are
/// minted from them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub services: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub stages: Vec<PlanStage>,
    #[serde(default, deserialize_with = "null_default")]
    pub params: Map<String, Value>,
}

/// One node of a plan's DAG. Either `upstream` or `downstream` suffices to
/// describe a link; the mission graph takes the union.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanStage {
    pub name: String,
    #[serde(default)]
    pub service: String,
    #[serde(default, deserialize_with = "null_default")]
    pub upstream: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub downstream: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub params: Map<String, Value>,
}

/// Key metadata as returned by `GET /key` and accepted by `POST /key`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Key {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub usage: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MissionCreateRequest {
    /// Saved plan name, or an entire plan as inline JSON.
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MissionCreatedResponse {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageStateUpdate {
    pub state: String,
    #[serde(default, rename = "ignoreDependencies")]
    pub ignore_dependencies: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuccessBody {
    pub message: String,
}

impl SuccessBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Machine-readable error body: `{message, type, code}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub code: u16,
}

/// Deserialize `null` as the type's default. Clients frequently send plans
/// with explicit `"upstream": null`.
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    let opt = Option::<T>::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}
