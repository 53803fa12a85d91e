use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    BadStream(#[from] bytes_cursor::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("invalid column type code: {0}")]
    InvalidColumnTypeCode(u8),
    #[error("checksum mismatch: expected={expected:08x}, actual={actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("utf8 string error: {0}")]
    Utf8String(#[from] std::string::FromUtf8Error),
    #[error("utf8 str error: {0}")]
    Utf8Str(#[from] std::str::Utf8Error),
}

impl Error {
    pub fn protocol<T: Into<String>>(msg: T) -> Self {
        Error::Protocol(msg.into())
    }

    /// true when the failure is a plain out-of-bounds read, the common
    /// signature of a truncated trailing event in a binlog file
    pub fn is_bad_stream(&self) -> bool {
        matches!(self, Error::BadStream(_))
    }
}
