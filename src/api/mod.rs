// src/api/mod.rs

pub mod auth;
pub mod health;
pub mod matches;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use redis::aio::ConnectionManager;

use crate::{
    config::Config,
    constants::ENGINE_SECRET_HEADER,
    error::{AppError, Result},
    services::MatchService,
};

#[derive(Clone)]
pub struct AppState {
    pub service: MatchService,
    pub redis: Option<ConnectionManager>,
    pub config: Config,
}

/// Resolves the calling player from a `Bearer` JWT; `sub` is the identity.
pub async fn require_user(headers: &HeaderMap, state: &AppState) -> Result<String> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::AuthError("Missing Authorization header".to_string()))?;
    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::AuthError("Invalid Authorization header".to_string()))?;
    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::AuthError("Invalid Authorization scheme".to_string()))?;

    let identity = auth::extract_user_from_token(token, &state.config.jwt_secret).await?;
    if identity.trim().is_empty() {
        return Err(AppError::AuthError("Token has an empty subject".to_string()));
    }
    Ok(identity)
}

/// Gate for CreateMatch and Finish, which only the match dispatcher may call.
pub fn require_authority(headers: &HeaderMap, state: &AppState) -> Result<()> {
    let secret = headers
        .get(ENGINE_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::AuthError("Missing engine secret".to_string()))?;
    if secret != state.config.engine_secret {
        return Err(AppError::AuthError("Invalid engine secret".to_string()));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::{db::MemoryMatchStore, services::ReplayCache};
    use axum::http::HeaderValue;
    use std::sync::Arc;

    pub fn state() -> AppState {
        let service = MatchService::new(
            Arc::new(MemoryMatchStore::new()),
            ReplayCache::local_only(),
        );
        AppState {
            service,
            redis: None,
            config: crate::config::test_config(),
        }
    }

    pub fn bearer(state: &AppState, identity: &str) -> HeaderMap {
        let token = auth::generate_jwt_token(identity, &state.config.jwt_secret).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    pub fn authority(state: &AppState) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ENGINE_SECRET_HEADER,
            HeaderValue::from_str(&state.config.engine_secret).unwrap(),
        );
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn require_user_reads_subject() {
        let state = state();
        let headers = bearer(&state, "alice");
        assert_eq!(require_user(&headers, &state).await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn require_user_rejects_missing_or_foreign_tokens() {
        let state = state();
        assert!(matches!(
            require_user(&HeaderMap::new(), &state).await,
            Err(AppError::AuthError(_))
        ));

        let mut foreign = state.clone();
        foreign.config.jwt_secret = "someone_else".to_string();
        let headers = bearer(&foreign, "alice");
        assert!(matches!(
            require_user(&headers, &state).await,
            Err(AppError::AuthError(_))
        ));
    }

    #[test]
    fn require_authority_checks_secret() {
        let state = state();
        assert!(require_authority(&authority(&state), &state).is_ok());
        assert!(require_authority(&HeaderMap::new(), &state).is_err());

        let mut wrong = HeaderMap::new();
        wrong.insert(ENGINE_SECRET_HEADER, "nope".parse().unwrap());
        assert!(require_authority(&wrong, &state).is_err());
    }
}
