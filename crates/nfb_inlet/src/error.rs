use thiserror::Error;

#[derive(Error, Debug)]
pub enum InletError {
    #[error("inlet configuration invalid: {0}")]
    InvalidConfig(String),

    #[error("I/O error reading replay source: {0}")]
    Io(#[from] std::io::Error),
}
