pub mod comparator;
pub mod cursor;
pub mod engine;
pub mod entry;
pub mod lister;
pub mod path_mapper;
pub mod scanner;
pub mod worker;

pub use comparator::{needs_transfer, SyncDirection};
pub use cursor::{LocalCursor, RemoteCursor};
pub use engine::{EngineState, SyncCandidate, SyncEngine, SyncOperation, SyncProgress, SyncReport};
pub use entry::TreeEntry;
pub use lister::RemoteLister;
pub use path_mapper::PathMapper;
pub use scanner::{LocalScanner, ScanConfig};
pub use worker::SyncWorker;
