use crate::auth::ApiCredentials;
use crate::error::AppError;
use crate::models::{CancelByIdQuery, CreateOrderRequest, OrderQuery};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use engine::OrderSelector;
use types::ids::OrderId;
use types::order::Order;
use uuid::Uuid;

pub async fn create_order(
    State(state): State<AppState>,
    creds: ApiCredentials,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let user = state.engine.authenticate(&creds.key, &creds.secret).await?;
    state.rate_limiter.check(&user, "order_create", 20, 20.0)?;

    let order = state
        .engine
        .create_order(&creds.key, &creds.secret, payload.into())
        .await?;
    Ok(Json(order))
}

pub async fn get_order(
    State(state): State<AppState>,
    creds: ApiCredentials,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Order>, AppError> {
    let user = state.engine.authenticate(&creds.key, &creds.secret).await?;
    state.rate_limiter.check(&user, "order_query", 60, 60.0)?;

    let order = state
        .engine
        .get_order(&user, &query.external_id, &query.symbol)
        .await?;
    Ok(Json(order))
}

pub async fn get_open_orders(
    State(state): State<AppState>,
    creds: ApiCredentials,
) -> Result<Json<Vec<Order>>, AppError> {
    let user = state.engine.authenticate(&creds.key, &creds.secret).await?;
    state.rate_limiter.check(&user, "order_query", 60, 60.0)?;

    Ok(Json(state.engine.open_orders_for_user(&user)))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    creds: ApiCredentials,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Order>, AppError> {
    let user = state.engine.authenticate(&creds.key, &creds.secret).await?;
    state.rate_limiter.check(&user, "order_cancel", 50, 50.0)?;

    let selector = OrderSelector::External {
        external_id: query.external_id,
        symbol: query.symbol,
    };
    let order = state.engine.cancel_order(Some(user), selector, false).await?;
    Ok(Json(order))
}

pub async fn cancel_order_by_id(
    State(state): State<AppState>,
    creds: ApiCredentials,
    Query(query): Query<CancelByIdQuery>,
) -> Result<Json<Order>, AppError> {
    let user = state.engine.authenticate(&creds.key, &creds.secret).await?;
    state.rate_limiter.check(&user, "order_cancel", 50, 50.0)?;

    let uuid = Uuid::parse_str(&query.order_id)
        .map_err(|_| AppError::BadRequest("invalid orderId".to_string()))?;
    let selector = OrderSelector::ById(OrderId::from_uuid(uuid));
    let order = state.engine.cancel_order(Some(user), selector, false).await?;
    Ok(Json(order))
}
