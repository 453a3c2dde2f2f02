use thiserror::Error;

/// Failure of one quality oracle fetch. Always soft: the refresher logs it
/// and retries on its next tick.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Invalid oracle URL: {0}")]
    InvalidUrl(String),

    #[error("Oracle request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Oracle responded with status {0}")]
    Status(reqwest::StatusCode),

    #[error("Oracle response could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            OracleError::Status(status)
        } else if err.is_decode() {
            OracleError::Decode(err)
        } else {
            OracleError::Transport(err)
        }
    }
}

/// Reasons an inbound bus message is dropped.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unrecognised subject: {0}")]
    UnknownSubject(String),

    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Payload carries no proposal")]
    MissingProposal,

    #[error("Proposal has no provider id or service type")]
    Unaddressable,
}
