use thiserror::Error;

#[derive(Error, Debug)]
pub enum HeapError {
    #[error("Found invalid pointer: offset {offset} must be non-negative")]
    InvalidPointer { offset: i64 },

    #[error("Found nullptr: size must be greater than 0, got {size}")]
    NullPointer { size: i64 },

    #[error("Type not supported: {0}")]
    UnsupportedType(String),

    #[error("Value of {size} bytes does not fit a handle of {capacity} bytes")]
    OversizedValue { size: i64, capacity: i64 },

    #[error("Window [{offset}, {offset}+{size}) is outside the file (length {file_len})")]
    OutOfBounds { offset: i64, size: i64, file_len: i64 },

    #[error("Allocation size overflows a 64-bit length")]
    SizeOverflow,

    #[error("No live block at offset {offset} with size {size}")]
    UnknownHandle { offset: i64, size: i64 },

    #[error("Block at offset {offset} with size {size} is already freed")]
    DoubleFree { offset: i64, size: i64 },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Header truncated: expected {expected} bytes, found {actual}")]
    HeaderTruncated { expected: usize, actual: usize },

    #[error("Corrupt header: {0}")]
    CorruptHeader(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HeapError>;
