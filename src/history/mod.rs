// History module - undo/redo as file snapshots grouped into commits

pub mod commit;
pub mod manager;

pub use commit::{Commit, FileSnapshot};
pub use manager::{DEFAULT_MAX_HISTORY, HistoryContext, HistoryLog, MAIN_CONTEXT};
