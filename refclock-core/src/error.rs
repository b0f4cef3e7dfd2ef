use thiserror::Error;

/// Errors crossing the public boundary of `refclock-core`.
///
/// Recoverable per-minute decoding conditions (frame sync loss, format
/// errors, majority-vote failure, insufficient timestamps) are *not*
/// represented here — they are status bits on the station unit, since the
/// pipeline never aborts on them (spec §7). This enum is for malformed
/// caller input and external-interface failures reported up to, but not
/// handled by, the core.
#[derive(Debug, Error)]
pub enum RefclockError {
    #[error("invalid decimal timestamp literal: {0:?}")]
    InvalidDecimal(String),
    #[error("invalid hex timestamp literal: {0:?}")]
    InvalidHex(String),
    #[error("invalid millisecond timestamp literal: {0:?}")]
    InvalidMillis(String),
    #[error("shared-memory segment unavailable: {0}")]
    Shm(String),
    #[error("invalid station configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RefclockError>;
