use std::io;

#[derive(Debug, thiserror::Error)]
pub enum GetoptxError {
    /// Rest of the flag cluster, starting at the unknown letter.
    #[error("bad option: -{0}")]
    BadOption(String),

    #[error("argument expected after -{0} option")]
    OptargExpected(char),

    #[error("empty or illegal long option spec: {0}")]
    LongSpec(String),

    #[error("not enough arguments")]
    NotEnoughArguments,

    #[error("not an identifier: {0}")]
    NotIdentifier(String),

    /// Lossy rendering of the offending argument.
    #[error("argument is not valid UTF-8: {0}")]
    NotUtf8(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, GetoptxError>;
