pub mod copier;
pub mod deleter;
pub mod engine;
pub mod events;
pub mod scanner;
pub mod scheduler;

pub use copier::{copy_tree, CopyStats, MTIME_TOLERANCE};
pub use deleter::{delete_orphans, DeleteStats};
pub use engine::{SyncEngine, SyncReport};
pub use events::{EventSink, SyncEvent, TracingSink};
pub use scanner::{list_tree, Inventory};
pub use scheduler::{Scheduler, SchedulerState};
