/// Infrastructure layer errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Listen failed: {0}")]
    ListenFailed(String),

    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Not connected to a session")]
    NotConnected,

    #[error("Peer not found: {0}")]
    PeerNotFound(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
