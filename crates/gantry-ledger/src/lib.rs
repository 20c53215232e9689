pub mod config;
pub mod lock;
pub mod paths;
pub mod sqlite_store;
pub mod workspace;

pub use config::Config;
pub use lock::WorkspaceLock;
pub use paths::GantryPaths;
pub use sqlite_store::{ImportRecord, SqliteStore};
pub use workspace::{Applied, Workspace};
