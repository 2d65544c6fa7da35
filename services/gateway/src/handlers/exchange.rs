use crate::error::AppError;
use crate::models::SymbolQuery;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use serde_json::json;
use types::symbol::SymbolInfo;

pub async fn get_symbol(
    State(state): State<AppState>,
    Query(query): Query<SymbolQuery>,
) -> Result<Json<SymbolInfo>, AppError> {
    let info = state
        .engine
        .symbol_info(&query.symbol, query.exchange)
        .await?;
    Ok(Json(info))
}

pub async fn get_price(
    State(state): State<AppState>,
    Query(query): Query<SymbolQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let price = state
        .engine
        .latest_price(&query.symbol, query.exchange)
        .await?;
    Ok(Json(json!({
        "symbol": query.symbol,
        "exchange": query.exchange,
        "price": price.to_string(),
    })))
}
