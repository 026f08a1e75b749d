pub mod common;
pub mod completions;
pub mod config;
pub mod list;
pub mod log;
pub mod schedule;
pub mod status;
pub mod sync;
