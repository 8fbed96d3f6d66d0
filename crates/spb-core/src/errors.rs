/// Core error type.
///
/// Adapter crates map their specific errors into this type so the pipeline can
/// recover from any per-update failure the same way.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("messaging error: {0}")]
    Messaging(String),

    #[error("handler error: {0}")]
    Handler(String),
}

pub type Result<T> = std::result::Result<T, Error>;
