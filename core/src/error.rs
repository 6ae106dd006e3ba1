use rust_decimal::Decimal;

/// The error taxonomy of the arbitrage core.
///
/// Propagation policy: the streaming loop never retries inline. Every
/// other component surfaces errors to its immediate caller without
/// wrapping retry/reconnect decisions into the error itself — those
/// decisions live at the call site (see `is_reconnect_eligible`).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The venue returned an error-typed frame, or a frame that fails
    /// schema validation.
    #[error("protocol error on {exchange}: {message}")]
    Protocol { exchange: String, message: String },

    /// Dial failure, read/write failure, or unexpected close.
    #[error("transport error on {exchange}: {source}")]
    Transport {
        exchange: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A subscriber sink could not accept a delivery; non-fatal,
    /// triggers a reconnect at the outer loop level.
    #[error("consume rate too slow on {exchange}")]
    BackPressure { exchange: String },

    #[error("exchange not found: {0}")]
    ExchangeNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// Only back-pressure errors are reconnect-eligible; everything
    /// else causes the adapter to give up.
    pub fn is_reconnect_eligible(&self) -> bool {
        matches!(self, CoreError::BackPressure { .. })
    }
}

pub fn non_finite_price_error(price: Decimal) -> CoreError {
    CoreError::InvalidInput(format!("non-finite or non-positive price: {price}"))
}

pub type CoreResult<T> = Result<T, CoreError>;
