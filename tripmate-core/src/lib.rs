pub mod identity;
pub mod repository;
pub mod search;
pub mod validate;

pub use identity::{Identity, IdentityProvider, StaticIdentity};
pub use repository::{
    ChatRepository, ShareRepository, TripDayRepository, TripPlaceRepository, TripRepository,
};
pub use search::{PlaceCandidate, PlaceSearch, PlaceSearchQuery, PlaceSearchResponse};
pub use validate::{parse_share_token, validate_share_settings, Validate};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Visit order {requested} is outside 1..={max}")]
    OutOfRange { requested: u32, max: u32 },
    #[error("Chat session is not connected")]
    NotConnected,
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl CoreError {
    /// Network-level failures; the only kind a read is retried on.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Transport(_))
    }

    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        CoreError::NotFound(format!("{} {}", what, id))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Protocol(e.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
