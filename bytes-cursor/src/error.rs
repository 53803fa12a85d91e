use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("bad stream: requested {requested} bytes but {available} available")]
    BadStream { requested: usize, available: usize },
}

impl Error {
    pub(crate) fn bad_stream(requested: usize, available: usize) -> Self {
        Error::BadStream {
            requested,
            available,
        }
    }
}
