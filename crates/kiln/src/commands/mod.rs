pub mod build;
pub mod clean;
pub mod serve;
pub mod task;
pub mod watch;
