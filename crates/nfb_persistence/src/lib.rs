pub mod buffers;
pub mod error;
pub mod store;

pub use buffers::RecordingBuffers;
pub use error::StoreError;
pub use store::{BlockRecord, GroupedStore};
