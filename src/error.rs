use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("session is not attached or the target has exited")]
    SessionInvalid,

    #[error("null address")]
    NullAddress,

    #[error("zero-length transfer requested")]
    ZeroLength,

    #[error("short transfer: {transferred} of {expected} bytes")]
    ShortTransfer { expected: usize, transferred: usize },

    #[error("malformed pattern: {0}")]
    Pattern(String),

    #[error("process error: {0}")]
    Process(String),

    #[error("OS error: {0}")]
    Os(#[from] nix::errno::Errno),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
