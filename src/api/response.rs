use axum::Json;
use serde::Serialize;

use crate::models::RegionResult;

/// Success envelope; payload fields are flattened next to `success`.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionPayload {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl RegionPayload {
    pub fn resolved(result: &RegionResult) -> Self {
        Self {
            status: result.status_label(),
            region: result.region().map(str::to_string),
        }
    }

    pub fn absent() -> Self {
        Self {
            status: "absent",
            region: None,
        }
    }
}
