use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    response::Json,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{service_error_to_response, ApiError, ApiJson};
use crate::models::{
    AuthResponse, AuthenticatedUser, LoginRequest, RegisterRequest, RegisterResponse, ServiceError,
};
use crate::services::AuthService;

#[derive(Clone, FromRef)]
pub struct AuthState {
    pub auth: Arc<AuthService>,
}

/// Caller resolved from `Authorization: Bearer <token>`
#[derive(Debug, Clone)]
pub struct AuthUser(pub AuthenticatedUser);

/// Caller holding the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<AuthService>::from_ref(state);

        let token = bearer_token(&parts.headers).ok_or_else(|| {
            service_error_to_response(ServiceError::unauthorized("missing bearer token"))
        })?;

        auth.verify_token(token).map(AuthUser).map_err(|err| {
            warn!(error = ?err, "Rejected session token");
            service_error_to_response(err)
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        let auth = Arc::<AuthService>::from_ref(state);

        auth.require_admin(&user).map_err(|err| {
            warn!(user_id = %user.user_id, "Admin route refused");
            service_error_to_response(err)
        })?;

        Ok(AdminUser(user))
    }
}

/// Register a new account with the `user` role
#[instrument(skip(state, request))]
pub async fn register(
    State(state): State<AuthState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    match state.auth.register(request).await {
        Ok(response) => {
            info!(user_id = %response.user_id, "Registered user");
            Ok((StatusCode::CREATED, Json(response)))
        }
        Err(err) => {
            warn!("Registration rejected: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

#[instrument(skip(state, request))]
pub async fn login(
    State(state): State<AuthState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    state
        .auth
        .login(request)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}
