//! Record handlers. Payloads are opaque ciphertext; only the version is
//! interpreted.

use super::{json_body, path_param};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::service::RecordService;
use crate::storage::models::RecordRow;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const RECORD_TYPES: [&str; 4] = ["credentials", "text", "binary", "card"];

#[derive(Serialize)]
pub struct RecordResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: String,
    pub nonce: String,
    pub version: i64,
}

impl From<RecordRow> for RecordResponse {
    fn from(row: RecordRow) -> Self {
        Self {
            id: row.id,
            kind: row.kind,
            data: STANDARD.encode(&row.data),
            nonce: STANDARD.encode(&row.nonce),
            version: row.version,
        }
    }
}

#[derive(Deserialize)]
pub struct PutRecordRequest {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: String,
    pub nonce: String,
    pub version: i64,
}

impl PutRecordRequest {
    fn into_row(self, id: Uuid) -> Result<RecordRow, ApiError> {
        if self.id.is_some_and(|body_id| body_id != id) {
            return Err(ApiError::BadRequest(
                "record id does not match path".to_string(),
            ));
        }
        if !RECORD_TYPES.contains(&self.kind.as_str()) {
            return Err(ApiError::BadRequest(format!(
                "unknown record type {:?}",
                self.kind
            )));
        }

        let data = STANDARD
            .decode(&self.data)
            .map_err(|e| ApiError::BadRequest(format!("Invalid data: {}", e)))?;
        let nonce = STANDARD
            .decode(&self.nonce)
            .map_err(|e| ApiError::BadRequest(format!("Invalid nonce: {}", e)))?;

        Ok(RecordRow {
            id,
            kind: self.kind,
            data,
            nonce,
            version: self.version,
        })
    }
}

pub async fn list_records(
    State(service): State<RecordService>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Vec<RecordResponse>>, ApiError> {
    let records = service.list_records(user_id)?;
    Ok(Json(records.into_iter().map(RecordResponse::from).collect()))
}

pub async fn get_record(
    State(service): State<RecordService>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<RecordResponse>, ApiError> {
    let id = path_param(id)?;
    Ok(Json(service.get_record(user_id, id)?.into()))
}

pub async fn put_record(
    State(service): State<RecordService>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<PutRecordRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let id = path_param(id)?;
    let row = json_body(body)?.into_row(id)?;
    service.save_record(user_id, &row)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_record(
    State(service): State<RecordService>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = path_param(id)?;
    service.delete_record(user_id, id)?;
    Ok(StatusCode::NO_CONTENT)
}
