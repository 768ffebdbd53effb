pub mod composite;
pub mod derived;
pub mod error;
pub mod rejections;
pub mod reward;

pub use composite::CompositeSignal;
pub use derived::DerivedSignal;
pub use error::SignalError;
pub use rejections::RejectionStack;
pub use reward::Reward;
