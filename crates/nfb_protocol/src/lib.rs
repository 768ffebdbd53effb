pub mod block;
pub mod error;
pub mod sequence;
pub mod settings;

pub use block::{
    BlockMarks, CueDirection, MockSource, PosnerConfig, ProbeSide, ProtocolBlock,
    ProtocolInstance, ProtocolKind, TickOutcome, PROBE_CODE_LEFT, PROBE_CODE_NONE,
    PROBE_CODE_RIGHT,
};
pub use error::ProtocolError;
pub use sequence::{GroupExpansion, ProtocolSequence};
pub use settings::Settings;
