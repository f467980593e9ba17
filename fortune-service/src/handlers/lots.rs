use crate::models::FortuneLot;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

pub async fn draw_lot(State(state): State<AppState>) -> Result<Json<FortuneLot>, AppError> {
    let lot = state.lots.draw_random().await?;
    tracing::info!(lot_id = lot.id, "Lot drawn");
    Ok(Json(lot))
}

pub async fn get_lot(
    State(state): State<AppState>,
    Path(lot_id): Path<i64>,
) -> Result<Json<FortuneLot>, AppError> {
    let lot = state.lots.get_by_id(lot_id).await?;
    Ok(Json(lot))
}
