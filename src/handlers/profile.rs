//! Farmer profile handlers

use axum::{extract::State, Json};

use crate::{AppState, AppError, AppResult};
use crate::middleware::auth::FarmerContext;
use crate::models::{Farmer, FarmerProfile, UpdateProfile};

/// Get the authenticated farmer's profile
pub async fn get(
    State(state): State<AppState>,
    farmer: FarmerContext,
) -> AppResult<Json<FarmerProfile>> {
    let farmer = Farmer::find_by_id(&state.pool, farmer.farmer_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Farmer not found".to_string()))?;

    Ok(Json(farmer.to_profile()))
}

/// Update name, preferred location or language
pub async fn update(
    State(state): State<AppState>,
    farmer: FarmerContext,
    Json(req): Json<UpdateProfile>,
) -> AppResult<Json<FarmerProfile>> {
    let updated = Farmer::update_profile(&state.pool, farmer.farmer_id, &req)
        .await?
        .ok_or_else(|| AppError::NotFound("Farmer not found".to_string()))?;

    tracing::info!("Profile updated for farmer {}", updated.id);

    Ok(Json(updated.to_profile()))
}
