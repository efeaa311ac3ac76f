use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;

use crate::{
    auth::{CurrentUser, Role},
    errors::ServiceError,
    models::status::CourierStatus,
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub status: CourierStatus,
}

/// GET /couriers/me: the caller's courier profile.
pub async fn my_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(Role::Courier)?;
    let profile = state.services.couriers.profile(user.user_id).await?;
    Ok(Json(ApiResponse::success(profile)))
}

/// POST /couriers/connect: flip the caller's availability.
pub async fn connect(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ConnectRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(Role::Courier)?;
    let profile = state
        .services
        .couriers
        .connect(user.user_id, request.status)
        .await?;

    state.event_sender.audit(
        user.user_id,
        "courier.connect",
        "courier",
        Some(profile.id),
        Some(request.status.to_string()),
    );
    Ok(Json(ApiResponse::success(profile)))
}
