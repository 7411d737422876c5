/// Core error type for the ability bot.
///
/// Adapter crates should map their specific errors into this type so the
/// dispatcher can report failures consistently.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("duplicate ability name: {0}")]
    DuplicateAbility(String),

    #[error("invalid ability {name:?}: {reason}")]
    InvalidAbility { name: String, reason: String },

    #[error("unresolved update: {0}")]
    UnresolvedUpdate(&'static str),

    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("collection {name} is a {found}, not a {expected}")]
    KindMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
