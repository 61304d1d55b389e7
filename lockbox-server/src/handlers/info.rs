//! Build information handler.

use crate::service::RecordService;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct VersionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_date: Option<String>,
}

pub async fn version(State(service): State<RecordService>) -> Json<VersionResponse> {
    let build = service.build_info();
    Json(VersionResponse {
        build_version: build.version.clone(),
        build_date: build.date.map(|d| d.format("%Y-%m-%d").to_string()),
    })
}
