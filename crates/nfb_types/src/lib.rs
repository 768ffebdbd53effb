pub mod channel_set;
pub mod chunk;
pub mod error;
pub mod stats;

pub use channel_set::ChannelSet;
pub use chunk::Chunk;
pub use error::NfbError;
pub use stats::StatsType;
