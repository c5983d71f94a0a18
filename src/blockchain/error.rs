use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("parent index {index} out of range (chain length {len})")]
    ParentOutOfRange { index: usize, len: usize },
    #[error("block not found: {0}")]
    BlockNotFound(String),
    #[error("invalid archive label {0:?}")]
    InvalidLabel(String),
    #[error("failed to encode archive: {0}")]
    ArchiveEncode(#[from] serde_json::Error),
    #[error("failed to write archive: {0}")]
    Archive(#[from] std::io::Error),
}
