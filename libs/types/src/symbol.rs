//! Exchange identifiers and per-symbol trading parameters
//!
//! The exchange set is closed: eight spot venues, five linear (USD-margined)
//! futures venues and six inverse (coin-margined) futures venues. Wire names
//! are the camelCase identifiers used by the upstream market-data service.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Market class of an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketClass {
    /// Plain asset exchange; settlement in base and quote
    Spot,
    /// Quote-margined futures; margin, fee and PnL in quote asset
    Linear,
    /// Base-margined futures; notional = contracts × contractSize / price
    Inverse,
}

/// Supported external venue identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    #[serde(rename = "binance")]
    Binance,
    #[serde(rename = "kucoin")]
    Kucoin,
    #[serde(rename = "bybit")]
    Bybit,
    #[serde(rename = "okx")]
    Okx,
    #[serde(rename = "coinbase")]
    Coinbase,
    #[serde(rename = "bitget")]
    Bitget,
    #[serde(rename = "mexc")]
    Mexc,
    #[serde(rename = "hyperliquid")]
    Hyperliquid,
    #[serde(rename = "binanceUsdm")]
    BinanceUsdm,
    #[serde(rename = "bybitUsdm")]
    BybitUsdm,
    #[serde(rename = "kucoinLinear")]
    KucoinLinear,
    #[serde(rename = "okxLinear")]
    OkxLinear,
    #[serde(rename = "bitgetUsdm")]
    BitgetUsdm,
    #[serde(rename = "binanceCoinm")]
    BinanceCoinm,
    #[serde(rename = "bybitInverse")]
    BybitInverse,
    #[serde(rename = "kucoinInverse")]
    KucoinInverse,
    #[serde(rename = "okxInverse")]
    OkxInverse,
    #[serde(rename = "bitgetCoinm")]
    BitgetCoinm,
    #[serde(rename = "hyperliquidInverse")]
    HyperliquidInverse,
}

impl Exchange {
    /// Wire name as used in channel names and HTTP query parameters
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Binance => "binance",
            Exchange::Kucoin => "kucoin",
            Exchange::Bybit => "bybit",
            Exchange::Okx => "okx",
            Exchange::Coinbase => "coinbase",
            Exchange::Bitget => "bitget",
            Exchange::Mexc => "mexc",
            Exchange::Hyperliquid => "hyperliquid",
            Exchange::BinanceUsdm => "binanceUsdm",
            Exchange::BybitUsdm => "bybitUsdm",
            Exchange::KucoinLinear => "kucoinLinear",
            Exchange::OkxLinear => "okxLinear",
            Exchange::BitgetUsdm => "bitgetUsdm",
            Exchange::BinanceCoinm => "binanceCoinm",
            Exchange::BybitInverse => "bybitInverse",
            Exchange::KucoinInverse => "kucoinInverse",
            Exchange::OkxInverse => "okxInverse",
            Exchange::BitgetCoinm => "bitgetCoinm",
            Exchange::HyperliquidInverse => "hyperliquidInverse",
        }
    }

    /// Parse a wire name into an Exchange
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "binance" => Some(Exchange::Binance),
            "kucoin" => Some(Exchange::Kucoin),
            "bybit" => Some(Exchange::Bybit),
            "okx" => Some(Exchange::Okx),
            "coinbase" => Some(Exchange::Coinbase),
            "bitget" => Some(Exchange::Bitget),
            "mexc" => Some(Exchange::Mexc),
            "hyperliquid" => Some(Exchange::Hyperliquid),
            "binanceUsdm" => Some(Exchange::BinanceUsdm),
            "bybitUsdm" => Some(Exchange::BybitUsdm),
            "kucoinLinear" => Some(Exchange::KucoinLinear),
            "okxLinear" => Some(Exchange::OkxLinear),
            "bitgetUsdm" => Some(Exchange::BitgetUsdm),
            "binanceCoinm" => Some(Exchange::BinanceCoinm),
            "bybitInverse" => Some(Exchange::BybitInverse),
            "kucoinInverse" => Some(Exchange::KucoinInverse),
            "okxInverse" => Some(Exchange::OkxInverse),
            "bitgetCoinm" => Some(Exchange::BitgetCoinm),
            "hyperliquidInverse" => Some(Exchange::HyperliquidInverse),
            _ => None,
        }
    }

    /// Market class of this venue
    pub fn class(&self) -> MarketClass {
        match self {
            Exchange::Binance
            | Exchange::Kucoin
            | Exchange::Bybit
            | Exchange::Okx
            | Exchange::Coinbase
            | Exchange::Bitget
            | Exchange::Mexc
            | Exchange::Hyperliquid => MarketClass::Spot,
            Exchange::BinanceUsdm
            | Exchange::BybitUsdm
            | Exchange::KucoinLinear
            | Exchange::OkxLinear
            | Exchange::BitgetUsdm => MarketClass::Linear,
            Exchange::BinanceCoinm
            | Exchange::BybitInverse
            | Exchange::KucoinInverse
            | Exchange::OkxInverse
            | Exchange::BitgetCoinm
            | Exchange::HyperliquidInverse => MarketClass::Inverse,
        }
    }

    pub fn is_spot(&self) -> bool {
        self.class() == MarketClass::Spot
    }

    pub fn is_futures(&self) -> bool {
        !self.is_spot()
    }

    pub fn is_inverse(&self) -> bool {
        self.class() == MarketClass::Inverse
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Key for watch-set entries and price maps: `<symbol>@<exchange>`
pub fn stream_key(symbol: &str, exchange: Exchange) -> String {
    format!("{}@{}", symbol, exchange.as_str())
}

/// Pub/sub channel carrying ticks for a symbol: `trade@<symbol>@<exchange>`
pub fn trade_channel(symbol: &str, exchange: Exchange) -> String {
    format!("trade@{}@{}", symbol, exchange.as_str())
}

/// Base-asset parameters of a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseAsset {
    pub name: String,
    #[serde(rename = "minAmount")]
    pub min_amount: Decimal,
    pub step: Decimal,
}

/// Quote-asset parameters of a symbol
///
/// For inverse contracts `min_amount` is the contract size in quote units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteAsset {
    pub name: String,
    #[serde(rename = "minAmount")]
    pub min_amount: Decimal,
}

/// Immutable per-symbol trading parameters, as served by the symbol service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub pair: String,
    pub exchange: Exchange,
    #[serde(rename = "baseAsset")]
    pub base_asset: BaseAsset,
    #[serde(rename = "quoteAsset")]
    pub quote_asset: QuoteAsset,
    #[serde(rename = "priceAssetPrecision")]
    pub price_asset_precision: u32,
    #[serde(rename = "maxOrders")]
    pub max_orders: u32,
}

impl SymbolInfo {
    /// Contract size in quote units (inverse contracts only)
    pub fn contract_size(&self) -> Decimal {
        self.quote_asset.min_amount
    }

    /// Asset in which derivatives margin and PnL settle
    pub fn margin_asset(&self) -> &str {
        if self.exchange.is_inverse() {
            &self.base_asset.name
        } else {
            &self.quote_asset.name
        }
    }
}
