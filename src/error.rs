use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Failed to initialize Matter stack: {0}")]
    MatterInitFailed(String),

    #[error("Matter stack error: {0:?}")]
    Matter(rs_matter::error::Error),

    #[error("No accessory attached to {0}")]
    AccessoryMissing(String),

    #[error("Invalid device configuration: {0}")]
    InvalidDeviceConfig(String),

    #[error("Position out of range: {0}")]
    InvalidPosition(u16),

    #[error("Endpoint IDs exhausted")]
    EndpointsExhausted,

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

impl From<rs_matter::error::Error> for BridgeError {
    fn from(e: rs_matter::error::Error) -> Self {
        BridgeError::Matter(e)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
