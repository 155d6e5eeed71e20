use crate::buffer::BufferError;
use crate::config::ConfigError;
use crate::redirect::RedirectError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Redirect error: {0}")]
    Redirect(#[from] RedirectError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
