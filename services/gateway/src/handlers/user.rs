use crate::auth::ApiCredentials;
use crate::error::AppError;
use crate::models::{HedgeRequest, LeverageRequest};
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::json;
use types::leverage::LeverageSetting;
use types::position::Position;
use types::wallet::Balance;

pub async fn get_positions(
    State(state): State<AppState>,
    creds: ApiCredentials,
) -> Result<Json<Vec<Position>>, AppError> {
    let user = state.engine.authenticate(&creds.key, &creds.secret).await?;
    state.rate_limiter.check(&user, "user_query", 60, 60.0)?;

    Ok(Json(state.engine.positions_for_user(&user).await?))
}

pub async fn get_balance(
    State(state): State<AppState>,
    creds: ApiCredentials,
) -> Result<Json<Vec<Balance>>, AppError> {
    let user = state.engine.authenticate(&creds.key, &creds.secret).await?;
    state.rate_limiter.check(&user, "user_query", 60, 60.0)?;

    Ok(Json(state.engine.balances_for_user(&user).await?))
}

pub async fn set_leverage(
    State(state): State<AppState>,
    creds: ApiCredentials,
    Json(payload): Json<LeverageRequest>,
) -> Result<Json<LeverageSetting>, AppError> {
    let user = state.engine.authenticate(&creds.key, &creds.secret).await?;
    state.rate_limiter.check(&user, "user_settings", 20, 10.0)?;

    if payload.leverage == 0 {
        return Err(AppError::BadRequest("leverage must be >= 1".to_string()));
    }
    let row = state
        .engine
        .set_leverage(&user, &payload.symbol, payload.side, payload.leverage)
        .await?;
    Ok(Json(row))
}

pub async fn set_hedge(
    State(state): State<AppState>,
    creds: ApiCredentials,
    Json(payload): Json<HedgeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = state.engine.authenticate(&creds.key, &creds.secret).await?;
    state.rate_limiter.check(&user, "user_settings", 20, 10.0)?;

    state.engine.set_hedge(&user, payload.hedge).await?;
    Ok(Json(json!({ "hedge": payload.hedge })))
}
