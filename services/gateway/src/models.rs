use engine::OrderParams;
use serde::Deserialize;
use types::numeric::{Price, Quantity};
use types::order::{OrderType, Side};
use types::position::PositionSide;
use types::symbol::Exchange;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub symbol: String,
    pub exchange: Exchange,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub price: Option<Price>,
    pub amount: Quantity,
    #[serde(rename = "externalId")]
    pub external_id: Option<String>,
    #[serde(rename = "reduceOnly", default)]
    pub reduce_only: bool,
    #[serde(rename = "positionSide")]
    pub position_side: Option<PositionSide>,
}

impl From<CreateOrderRequest> for OrderParams {
    fn from(req: CreateOrderRequest) -> Self {
        OrderParams {
            symbol: req.symbol,
            exchange: req.exchange,
            side: req.side,
            order_type: req.order_type,
            price: req.price,
            amount: req.amount,
            external_id: req.external_id,
            reduce_only: req.reduce_only,
            position_side: req.position_side,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderQuery {
    #[serde(rename = "externalId")]
    pub external_id: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelByIdQuery {
    #[serde(rename = "orderId")]
    pub order_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeverageRequest {
    pub symbol: String,
    pub leverage: u32,
    pub side: Option<PositionSide>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HedgeRequest {
    pub hedge: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolQuery {
    pub symbol: String,
    pub exchange: Exchange,
}
