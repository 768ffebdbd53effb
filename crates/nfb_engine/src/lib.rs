pub mod channel_trouble;
pub mod error;
pub mod recorder;
pub mod sequencer;

pub use channel_trouble::ChannelTroubleDetector;
pub use error::EngineError;
pub use recorder::Recorder;
pub use sequencer::{Engine, SignalUnion, TickEvent};
