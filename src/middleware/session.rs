use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, header, request::Parts},
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError, middleware::auth::authenticate, models::CartOwner, state::AppState,
};

pub const SESSION_HEADER: &str = "x-session-key";

const SESSION_KEY_MAX_LEN: usize = 40;

/// Cart identity for a request: the logged-in user, else the anonymous session.
#[derive(Debug, Clone)]
pub struct CartIdentity {
    pub owner: CartOwner,
    /// True when this request minted a fresh session key.
    pub issued: bool,
}

impl CartIdentity {
    /// Echo the session key back so anonymous clients can keep their cart.
    pub fn respond(&self, body: impl IntoResponse) -> Response {
        let mut response = body.into_response();
        if let Some(key) = self.owner.session_key() {
            if let Ok(value) = HeaderValue::from_str(key) {
                response.headers_mut().insert(SESSION_HEADER, value);
            }
        }
        response
    }
}

/// 32 lowercase hex characters.
pub fn new_session_key() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

fn valid_session_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= SESSION_KEY_MAX_LEN
        && key.chars().all(|c| c.is_ascii_alphanumeric())
}

impl FromRequestParts<AppState> for CartIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) {
            let auth_str = auth_header
                .to_str()
                .map_err(|_| AppError::BadRequest("Invalid Authorization header".into()))?;
            let user = authenticate(auth_str, &state.config.jwt_secret)?;
            return Ok(Self {
                owner: CartOwner::User(user.user_id),
                issued: false,
            });
        }

        let presented = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim);

        match presented {
            Some(key) if valid_session_key(key) => Ok(Self {
                owner: CartOwner::Session(key.to_string()),
                issued: false,
            }),
            Some(_) => Err(AppError::BadRequest("Invalid session key".into())),
            None => {
                let key = new_session_key();
                tracing::debug!("issued new cart session");
                Ok(Self {
                    owner: CartOwner::Session(key),
                    issued: true,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_valid_and_distinct() {
        let a = new_session_key();
        let b = new_session_key();
        assert_eq!(a.len(), 32);
        assert!(valid_session_key(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_unsafe_keys() {
        assert!(!valid_session_key(""));
        assert!(!valid_session_key("abc def"));
        assert!(!valid_session_key(&"a".repeat(41)));
        assert!(valid_session_key("abc123"));
    }
}
