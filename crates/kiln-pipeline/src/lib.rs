//! Asset transform tasks for kiln.
//!
//! Every asset class (styles, scripts, images, sprite, fonts, pages) is a
//! [`Task`] reading Source Files from the app directory and writing Staged
//! Outputs next to them. [`Publisher`] runs the tasks, clears the
//! distribution directory and copies the publishable selection into it.

pub mod clean;
pub mod fonts;
pub mod freshness;
pub mod glob;
pub mod images;
pub mod layout;
pub mod pages;
pub mod publish;
pub mod scripts;
pub mod sprite;
pub mod styles;
pub mod task;

pub use clean::clean;
pub use glob::{PatternError, PatternList};
pub use layout::{ImagesConfig, ProjectLayout, ScriptsConfig, StylesConfig};
pub use publish::{copy_matching, PublishError, PublishResult, Publisher};
pub use task::{Task, TaskError, TaskKind, TaskReport, TransformFailure};
