use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("protocol sequence references unknown protocol index {0}")]
    UnknownProtocolIndex(usize),

    #[error("protocol group {0} is empty")]
    EmptyGroup(usize),
}
