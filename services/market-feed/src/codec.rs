//! Channel naming and tick payload decoding

use types::errors::FeedError;
use types::symbol::Exchange;
use types::ticker::Ticker;

/// Parse a pub/sub channel name of the form `trade@<symbol>@<exchange>`.
pub fn parse_trade_channel(channel: &str) -> Option<(String, Exchange)> {
    let mut parts = channel.split('@');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("trade"), Some(symbol), Some(exchange), None) if !symbol.is_empty() => {
            Exchange::parse(exchange).map(|exchange| (symbol.to_string(), exchange))
        }
        _ => None,
    }
}

/// Decode a tick payload. Numeric fields arrive as numbers or strings
/// depending on the upstream venue.
pub fn decode_ticker(payload: &str) -> Result<Ticker, FeedError> {
    serde_json::from_str(payload).map_err(|err| FeedError::BadPayload(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::numeric::Price;

    #[test]
    fn test_parse_trade_channel() {
        assert_eq!(
            parse_trade_channel("trade@BTCUSDT@binance"),
            Some(("BTCUSDT".to_string(), Exchange::Binance))
        );
        assert_eq!(
            parse_trade_channel("trade@ETHUSDT@okxLinear"),
            Some(("ETHUSDT".to_string(), Exchange::OkxLinear))
        );
        assert_eq!(parse_trade_channel("trade@BTCUSDT@ftx"), None);
        assert_eq!(parse_trade_channel("candles@BTCUSDT@binance"), None);
        assert_eq!(parse_trade_channel("trade@@binance"), None);
        assert_eq!(parse_trade_channel("trade@BTCUSDT@binance@extra"), None);
    }

    #[test]
    fn test_decode_ticker_mixed_encodings() {
        let payload = r#"{
            "symbol": "BTCUSDT",
            "exchange": "binance",
            "bestAsk": "50000.5",
            "bestBid": 49999.5,
            "bestAskQnt": "0.2",
            "bestBidQnt": 0.4,
            "price": "50000",
            "time": 1708123456789,
            "eventTime": "1708123456790"
        }"#;
        let tick = decode_ticker(payload).unwrap();
        assert_eq!(tick.price, Price::from_u64(50_000));
        assert_eq!(tick.ticker_time(), 1708123456790);
    }

    #[test]
    fn test_decode_bad_payload() {
        let err = decode_ticker("not json").unwrap_err();
        assert!(matches!(err, FeedError::BadPayload(_)));
    }
}
