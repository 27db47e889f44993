use thiserror::Error;

#[derive(Debug, Error)]
pub enum FathomError {
    #[error("Invalid FAT volume: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt cluster chain: {0}")]
    CorruptChain(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("FAT12 entry spans past the last FAT sector: {0}")]
    SectorSpan(String),
}
