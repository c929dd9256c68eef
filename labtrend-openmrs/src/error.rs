use labtrend_core::LabError;

/// Failure talking to the clinical record server.
///
/// Every variant is fatal for the request that produced it; nothing partial is cached.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("Unexpected response payload: {0}")]
    Decode(String),
    #[error(transparent)]
    Config(#[from] LabError),
}
