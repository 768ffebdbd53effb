use thiserror::Error;

/// Crate-wide error type shared by the lowest layer of the engine.
/// Higher crates wrap this with `#[from]` rather than re-deriving their
/// own shape-mismatch variants.
#[derive(Error, Debug)]
pub enum NfbError {
    #[error("chunk shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("unknown channel label: {0}")]
    UnknownChannel(String),
}
