//! Registration and login handlers.

use super::json_body;
use crate::error::ApiError;
use crate::service::RecordService;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub login: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

pub async fn register(
    State(service): State<RecordService>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let req = json_body(body)?;
    let token = service.register(&req.login, &req.password).await?;
    Ok(Json(TokenResponse { token }))
}

pub async fn login(
    State(service): State<RecordService>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let req = json_body(body)?;
    let token = service.login(&req.login, &req.password).await?;
    Ok(Json(TokenResponse { token }))
}
