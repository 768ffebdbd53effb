pub mod error;
pub mod inlet;
pub mod mock;
pub mod replay;

pub use error::InletError;
pub use inlet::Inlet;
pub use mock::MockInlet;
pub use replay::FileReplayInlet;
