use shared::error::DomainError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

pub type CartResult<T> = Result<T, CartError>;

#[derive(Debug, Error)]
pub enum CartError {
    /// Request/response failure: network, non-success status or undecodable body.
    #[error("cart service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("push channel failed: {0}")]
    Channel(String),
    #[error("malformed cart payload: {0}")]
    MalformedPayload(String),
    #[error("invalid cart service endpoint: {0}")]
    InvalidEndpoint(String),
}

impl From<DomainError> for CartError {
    fn from(value: DomainError) -> Self {
        Self::MalformedPayload(value.to_string())
    }
}

impl From<serde_json::Error> for CartError {
    fn from(value: serde_json::Error) -> Self {
        Self::MalformedPayload(value.to_string())
    }
}

impl From<tungstenite::Error> for CartError {
    fn from(value: tungstenite::Error) -> Self {
        Self::Channel(value.to_string())
    }
}
