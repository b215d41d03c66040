//! Build pipeline module for sitepipe
//!
//! Provides the task graph that turns a site's sources into a deployable
//! bundle.
//!
//! # Overview
//!
//! The build pipeline consists of:
//! - **Discovery**: Find source files using glob patterns from config
//! - **Streams**: Read matching files, pass them through transform stages,
//!   write them below the temp or output root
//! - **Flows**: Compose tasks in series and parallel groups
//! - **Reporting**: Per-task results and output sizes
//!
//! # Example
//!
//! ```ignore
//! use sitepipe::build::{BuildContext, Flow, TaskRunner};
//! use sitepipe::config::load_config;
//! use sitepipe::mode::BuildMode;
//!
//! let config = load_config(None)?;
//! let context = BuildContext::new(config, project_root, BuildMode::Production);
//! let result = TaskRunner::new(&context).run(&Flow::build())?;
//! println!("{}", result.summary());
//! ```

pub mod clean;
pub mod context;
pub mod discovery;
pub mod incremental;
pub mod pipeline;
pub mod report;
pub mod result;
pub mod stream;
pub mod task;
pub mod template;

pub use clean::*;
pub use context::*;
pub use discovery::*;
pub use incremental::*;
pub use pipeline::*;
pub use report::*;
pub use result::*;
pub use stream::*;
pub use task::*;
pub use template::*;
