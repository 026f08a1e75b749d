//! Offline-first sync between the local store and a remote backend.
//!
//! [`SyncEngine`] runs passes; [`BackgroundScheduler`] decides when.
//! Remote access goes through [`RemoteBackend`], implemented over REST by
//! [`RestRemoteBackend`] and in process by [`MemoryRemoteBackend`].

mod conflict;
mod engine;
mod error;
mod memory;
mod network;
mod optimizer;
mod remote;
mod rest;
mod retry;
mod scheduler;
pub mod wire;

pub use conflict::{resolve_conflict, ConflictDetector};
pub use engine::{
    PassUsage, SyncAbort, SyncEngine, SyncOptions, SyncPhase, SyncProgress, SyncResult, SyncStage,
};
pub use error::{SyncError, SyncResultOf};
pub use memory::{InjectedFailure, MemoryRemoteBackend};
pub use network::{BatteryState, NetworkClass, NetworkMonitor, NetworkState, StaticNetworkMonitor};
pub use optimizer::{optimize, CompressionLevel, SyncPlan};
pub use remote::RemoteBackend;
pub use rest::RestRemoteBackend;
pub use retry::{RecordRef, RetryDecision, RetryQueue, RetryQueueEntry};
pub use scheduler::{BackgroundScheduler, ScheduleDecision};
