use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("binlog stream error: {0}")]
    Binlog(String),
    #[error("decode error in {file} at {pos}: {source}")]
    Event {
        file: String,
        pos: u32,
        #[source]
        source: docbridge_core::Error,
    },
    #[error("{0}")]
    Core(#[from] docbridge_core::Error),
    #[error("{0}")]
    BadStream(#[from] bytes_cursor::Error),
    #[error("table diff error: {0}")]
    TableDiff(String),
    #[error("sink error: {0}")]
    Sink(String),
    #[error("store error: {0}")]
    Store(String),
}

impl Error {
    pub fn sink<T: Into<String>>(msg: T) -> Self {
        Error::Sink(msg.into())
    }

    pub fn event(file: &str, pos: u32, source: docbridge_core::Error) -> Self {
        Error::Event {
            file: file.to_string(),
            pos,
            source,
        }
    }
}
