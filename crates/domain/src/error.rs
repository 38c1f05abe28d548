/// Shared error type used across all warroom crates.
///
/// Variants mirror the failure classes the operation surface reports to
/// clients; the gateway maps each to an HTTP status. Validation failures
/// inside action processing are NOT errors — they travel as
/// [`crate::action::ActionResult`] so callers can surface them per action.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("not your turn: {0}")]
    NotYourTurn(String),

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("internal: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable machine-readable tag for wire responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "unauthenticated",
            Self::PermissionDenied(_) => "permission_denied",
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidState(_) => "invalid_state",
            Self::NotYourTurn(_) => "not_your_turn",
            Self::InvalidAction(_) => "invalid_action",
            Self::RateLimited(_) => "rate_limited",
            Self::ResourceExhausted(_) => "resource_exhausted",
            Self::Internal(_) => "internal",
        }
    }
}
