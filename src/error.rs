use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("device error: {0}")]
    Device(String),
    #[error("{0} channel closed")]
    ChannelClosed(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
