use thiserror::Error;

/// Why a room operation had no effect.
///
/// Only `Rejected` ever reaches a client (as an HTTP 403 on upgrade). The
/// rest are logged by the caller and otherwise dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("address is banned for another {remaining_ms} ms")]
    Rejected { remaining_ms: u64 },

    #[error("admin authority required")]
    Unauthorized,

    #[error("no such message or participant")]
    NotFound,

    #[error("invalid input")]
    InvalidInput,
}

pub type Result<T> = std::result::Result<T, RoomError>;
