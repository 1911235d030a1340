use thiserror::Error;

#[derive(Error, Debug)]
pub enum KentGraphError {
    #[error("Configuration error: {0}")]
    Config(String),
}
