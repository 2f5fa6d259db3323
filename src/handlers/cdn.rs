use axum::{
    extract::{FromRef, State},
    response::Json,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::AuthUser;
use crate::models::CdnAuthParameters;
use crate::services::{AuthService, CdnAuthService};

#[derive(Clone, FromRef)]
pub struct CdnState {
    pub cdn: Arc<CdnAuthService>,
    pub auth: Arc<AuthService>,
}

/// Upload parameters for the image CDN, valid for 30 minutes
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn imagekit_auth(
    State(state): State<CdnState>,
    AuthUser(user): AuthUser,
) -> Json<CdnAuthParameters> {
    let params = state.cdn.upload_parameters();
    debug!(expire = params.expire, "Issued upload parameters");
    Json(params)
}
