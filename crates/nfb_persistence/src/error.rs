use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error writing session store: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize store metadata: {0}")]
    Serialize(#[from] serde_json::Error),
}
