use crate::handlers::{exchange, order, user};
use crate::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/order",
            post(order::create_order)
                .get(order::get_order)
                .delete(order::cancel_order),
        )
        .route("/order/all/open", get(order::get_open_orders))
        .route("/order/byid", delete(order::cancel_order_by_id))
        .route("/exchange", get(exchange::get_symbol))
        .route("/exchange/price", get(exchange::get_price))
        .route("/user/positions", get(user::get_positions))
        .route("/user/balance", get(user::get_balance))
        .route("/user/leverage", post(user::set_leverage))
        .route("/user/hedge", post(user::set_hedge))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
