use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// Client acquisition or listener registration failed.
    #[error("Construction failed: {0}")]
    Construction(String),
    /// The client rejected a request synchronously.
    #[error("Submission failed: {0}")]
    Submission(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type BridgeResult<T> = Result<T, BridgeError>;

impl BridgeError {
    pub fn construction<S: Into<String>>(message: S) -> Self {
        BridgeError::Construction(message.into())
    }

    pub fn submission<S: Into<String>>(message: S) -> Self {
        BridgeError::Submission(message.into())
    }
}
