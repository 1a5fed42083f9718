/// Core error type for the Twin Lunch bot.
///
/// Adapter crates should map their specific errors into this type so the core
/// can tell persistence failures from transport failures when it logs them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("secret error: {0}")]
    Secret(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
