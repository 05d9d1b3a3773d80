use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Element is detached from the document: {0}")]
    ElementDetached(String),

    #[error("Recording already active")]
    AlreadyRecording,

    #[error("No active recording")]
    NoActiveRecording,

    #[error("Stop already in progress")]
    StopInProgress,

    #[error("No active tab")]
    NoActiveTab,

    #[error("Invalid control message: {0}")]
    InvalidControl(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RecorderError>;
