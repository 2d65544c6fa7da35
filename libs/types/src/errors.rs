//! Error taxonomy for the venue simulator
//!
//! Comprehensive error taxonomy using thiserror. Validation failures carry
//! the wire messages surfaced to HTTP callers as 400s; infrastructure
//! failures (storage, feed) are logged and retried by their owners.

use thiserror::Error;

/// Top-level engine error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Position error: {0}")]
    Position(#[from] PositionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Numeric error: {0}")]
    Numeric(#[from] crate::numeric::NumericError),

    #[error("Symbol not found: {symbol}@{exchange}")]
    SymbolNotFound { symbol: String, exchange: String },
}

impl EngineError {
    /// Whether this error is a caller mistake (HTTP 400) rather than an
    /// internal failure.
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            EngineError::Storage(_) | EngineError::Feed(_) | EngineError::Numeric(_)
        )
    }
}

/// Order-specific errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Order not found: {selector}")]
    NotFound { selector: String },

    #[error("Order already in terminal state: {status}")]
    AlreadyTerminal { status: String },

    #[error("Duplicated externalId + symbol")]
    DuplicateExternalId,

    #[error("Reduce order rejected")]
    ReduceRejected,

    #[error("Too many open orders for symbol (max {max})")]
    TooManyOrders { max: u32 },
}

/// Account-specific errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccountError {
    #[error("User not found")]
    UserNotFound,

    #[error("Insufficient balance for asset {asset}: required {required}, available {available}")]
    InsufficientBalance {
        asset: String,
        required: String,
        available: String,
    },

    #[error("positionSide must be LONG or SHORT in hedge mode")]
    HedgeModeViolation,

    #[error("Leverage is locked for {symbol} while positions are open")]
    LeverageLocked { symbol: String },

    #[error("Hedge mode cannot change while positions or orders are open")]
    HedgeLocked,
}

/// Position-specific errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PositionError {
    #[error("Position not found: {uuid}")]
    NotFound { uuid: String },

    #[error("Position already closed: {uuid}")]
    AlreadyClosed { uuid: String },
}

/// Storage-layer errors surfaced through the ports
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Unique constraint violated: {0}")]
    Duplicate(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Market-data feed errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("Feed disconnected: {0}")]
    Disconnected(String),

    #[error("Bad payload: {0}")]
    BadPayload(String),

    #[error("Price unavailable for {symbol}@{exchange}")]
    PriceUnavailable { symbol: String, exchange: String },
}
