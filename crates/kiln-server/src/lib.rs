//! Development server and watch loop for kiln.
//!
//! Serves the app directory with directory listings and live reload, and
//! re-runs transform tasks when their sources change.

pub mod reload;
pub mod server;
pub mod watch_loop;
pub mod watcher;

pub use reload::{ReloadHub, ReloadMessage};
pub use server::{DevServer, DevServerConfig, ServerError};
pub use watch_loop::{default_rules, WatchAction, WatchLoop, WatchRule};
pub use watcher::{ChangeKind, FileWatcher, FsChange};
