//! Bearer-token authentication for protected routes.
//!
//! The auth gate is an axum extractor: a handler that takes [`AuthUser`] as
//! an argument only runs once the `Authorization` header has been verified
//! and the token's username resolved against the user table. The resolved
//! user is a request-scoped value, not a stored session.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use tracing::warn;

use muster_auth::verify_token;
use muster_store::User;

use crate::handlers::ApiError;
use crate::AppState;

/// The user resolved from a request's bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Extract the bearer token from the Authorization header
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing auth token"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Missing auth token"))?;

        // Verify the signature before touching the store
        let claims = verify_token(token, &state.config.token_secret).map_err(|e| {
            warn!(error = %e, "token verification failed");
            ApiError::unauthorized("Invalid auth token")
        })?;

        // The token subject must still resolve to a stored user
        let user: Option<User> = {
            let db = state.db.lock().await;
            db.get_user_by_name(&claims.sub).map_err(|e| {
                tracing::error!(error = %e, "user lookup failed during auth");
                ApiError::internal("Internal server error")
            })?
        };

        match user {
            Some(user) => Ok(AuthUser(user)),
            None => {
                warn!(username = %claims.sub, "token subject does not resolve to a user");
                Err(ApiError::forbidden("Invalid auth token"))
            }
        }
    }
}
