//! Error types for offline storage operations

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage quota exceeded")]
    QuotaExceeded,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    Lock,
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::Unavailable("disabled by policy".to_string());
        assert_eq!(err.to_string(), "Storage unavailable: disabled by policy");

        let err = StorageError::QuotaExceeded;
        assert_eq!(err.to_string(), "Storage quota exceeded");
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<Vec<String>>("{not json").unwrap_err();
        let err: StorageError = json_err.into();
        assert!(matches!(err, StorageError::Serialization(_)));
    }
}
