use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Signal(#[from] nfb_signals::SignalError),

    #[error(transparent)]
    Inlet(#[from] nfb_inlet::InletError),

    #[error(transparent)]
    Store(#[from] nfb_persistence::StoreError),

    #[error("protocol sequence is exhausted")]
    SequenceExhausted,
}

impl EngineError {
    /// True for errors a tick loop should never try to continue past:
    /// the inlet is misconfigured, the sequence ran off its own end, or a
    /// flush has already been retried once and failed again. Everything
    /// else (a single bad signal computation, a transient store I/O
    /// error on its first occurrence) is logged and the tick skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::Inlet(nfb_inlet::InletError::InvalidConfig(_))
                | EngineError::SequenceExhausted
                // Reaching tick() as a Store error means on_block_exit's
                // own retry already failed once, so there's no point
                // skipping the tick and trying again next period.
                | EngineError::Store(_)
        )
    }
}
