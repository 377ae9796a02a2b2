//! CLI command implementations

pub mod changes;
pub mod status;
pub mod sync;

pub use changes::ChangesArgs;
pub use status::StatusArgs;
pub use sync::SyncArgs;
