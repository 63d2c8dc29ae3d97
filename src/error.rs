use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("failed to install the log subscriber")]
    Logging,
    #[display("catalog error")]
    Catalog,
    #[display("library error")]
    Library,
    #[display("failed to write {}", _0.display())]
    Output(#[error(not(source))] PathBuf),
    #[display("failed to read commands from stdin")]
    Input,
    #[display("{_0}")]
    NotFound(#[error(not(source))] String),
}
