use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A configuration source couldn't be read or parsed
    #[display("failed to load configuration")]
    Load,
    /// Configuration parsed but a value is out of range
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
    /// No platform data directory to put the default catalog in
    #[display("could not determine a home directory; set `database` explicitly")]
    NoHomeDirectory,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        false
    }
}
