use std::string;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("entity `{0}` not found")]
    NotFound(String),
    #[error("failed in IO")]
    IO(#[from] std::io::Error),
    #[error("compilation failed: {0}")]
    Compilation(String),
    #[error("unknown language `{0}`")]
    UnknownLanguage(String),
    #[error("environment error")]
    Environment(String),
    #[error("data error")]
    Data(String),
    #[error("config parse error")]
    Config(#[from] serde_yaml::Error),
    #[error("bytes is not in UTF8")]
    FromUtf8(#[from] string::FromUtf8Error),
    #[error("worker error")]
    Worker(String),
}
