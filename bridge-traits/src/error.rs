use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("HTTP {status} from {locator}")]
    HttpStatus { status: u16, locator: String },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether retrying the same operation later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            BridgeError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            BridgeError::Io(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
