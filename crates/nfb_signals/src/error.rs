use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignalError {
    #[error(transparent)]
    Types(#[from] nfb_types::NfbError),

    #[error("composite signal '{0}' references an unknown or not-yet-defined signal '{1}'")]
    UnknownReference(String, String),

    #[error("composite signal expression could not be parsed: {0}")]
    ParseError(String),

    #[error("rejection matrix index {0} out of bounds (stack has {1} entries)")]
    RejectionIndexOutOfBounds(usize, usize),
}
