//! Client push-event payloads
//!
//! Two per-user topics exist: `order` (execution reports) and
//! `outboundAccountInfo` (balance snapshots). Every event carries a
//! `type` discriminator of `update`, `info` or `error`.

use serde::Serialize;
use types::order::Order;
use types::position::Position;
use types::wallet::Balance;

/// Per-user push topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushTopic {
    /// Execution reports
    Order,
    /// Balance snapshots
    OutboundAccountInfo,
}

impl PushTopic {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushTopic::Order => "order",
            PushTopic::OutboundAccountInfo => "outboundAccountInfo",
        }
    }
}

/// Push-event envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PushEvent {
    Update { data: serde_json::Value },
    Info { info: serde_json::Value },
    Error { error: String },
}

/// Execution report for an order transition
pub fn order_update(order: &Order) -> PushEvent {
    PushEvent::Update {
        data: serde_json::to_value(order).unwrap_or(serde_json::Value::Null),
    }
}

/// Position update (liquidations, derivative fills)
pub fn position_update(position: &Position) -> PushEvent {
    PushEvent::Update {
        data: serde_json::to_value(position).unwrap_or(serde_json::Value::Null),
    }
}

/// Balance snapshot for the `outboundAccountInfo` topic
pub fn account_snapshot(balances: &[Balance]) -> PushEvent {
    PushEvent::Info {
        info: serde_json::to_value(balances).unwrap_or(serde_json::Value::Null),
    }
}

/// Error notice on either topic
pub fn error_notice(message: impl Into<String>) -> PushEvent {
    PushEvent::Error {
        error: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use types::ids::UserId;

    #[test]
    fn test_topic_names() {
        assert_eq!(PushTopic::Order.as_str(), "order");
        assert_eq!(
            PushTopic::OutboundAccountInfo.as_str(),
            "outboundAccountInfo"
        );
    }

    #[test]
    fn test_event_envelope_shape() {
        let balances = vec![Balance::new(UserId::new(), "USDT", Decimal::from(100))];
        let event = account_snapshot(&balances);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "info");
        assert!(json["info"].is_array());

        let err = error_notice("boom");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["error"], "boom");
    }
}
