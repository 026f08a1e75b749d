//! stillwater-core - Core library for Stillwater
//!
//! Records for meditation sessions, moods and journal entries, the local
//! libSQL store they live in, and the offline-first sync engine that moves
//! them to and from a remote backend.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
