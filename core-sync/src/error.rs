use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::error::BridgeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download of {key} failed: {message}")]
    Download { key: String, message: String },

    #[error("Invalid offline item {key}: {message}")]
    InvalidItem { key: String, message: String },
}

impl SyncError {
    /// Whether the failure only affects the item being registered.
    ///
    /// Network, file and metadata problems skip the item; library storage
    /// failures abort the sync.
    pub fn is_item_failure(&self) -> bool {
        matches!(
            self,
            SyncError::Bridge(_)
                | SyncError::Io(_)
                | SyncError::Download { .. }
                | SyncError::InvalidItem { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
