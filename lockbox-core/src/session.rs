//! Authenticated session shared between the vault and its gateway.

use crate::{LockboxError, Result};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

#[derive(Clone)]
struct SessionState {
    token: String,
    user_id: Uuid,
}

/// Holder of the bearer token for the current account.
///
/// Cheap to clone; all clones see the same token.
#[derive(Clone, Default)]
pub struct Session {
    state: Arc<RwLock<Option<SessionState>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly issued token and return the user id it names.
    pub fn set_token(&self, token: String) -> Result<Uuid> {
        let user_id = token_subject(&token)?;
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        *state = Some(SessionState { token, user_id });
        Ok(user_id)
    }

    pub fn token(&self) -> Option<String> {
        self.read().map(|s| s.token)
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.read().map(|s| s.user_id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    /// Forget the token.
    pub fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        *state = None;
    }

    fn read(&self) -> Option<SessionState> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id())
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct Claims {
    sub: String,
}

/// Read the `sub` claim of a JWT without verifying it.
///
/// Only used to pick the local store; the server verifies every token.
pub fn token_subject(token: &str) -> Result<Uuid> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.set_required_spec_claims(&["sub"]);

    let data = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| LockboxError::UnexpectedResponse(format!("bad token: {}", e)))?;

    Uuid::parse_str(&data.claims.sub)
        .map_err(|_| LockboxError::UnexpectedResponse("token subject is not a user id".to_string()))
}

#[cfg(test)]
pub(crate) fn fake_token(user_id: Uuid) -> String {
    signed_claims(&serde_json::json!({ "sub": user_id.to_string(), "exp": 4102444800u64 }))
}

#[cfg(test)]
fn signed_claims(claims: &serde_json::Value) -> String {
    use jsonwebtoken::{EncodingKey, Header};
    jsonwebtoken::encode(&Header::default(), claims, &EncodingKey::from_secret(b"test")).unwrap()
}
