pub mod feed;
pub mod lifecycle;
pub mod registry;
pub mod session;
pub mod snapshot;

pub use feed::MockFeed;
pub use lifecycle::{Engine, EngineCommand, EngineHandle, EngineSettings};
pub use registry::ExchangeRegistry;
pub use session::Session;
pub use snapshot::{build_snapshot, SignalChange, SnapshotDiff};
