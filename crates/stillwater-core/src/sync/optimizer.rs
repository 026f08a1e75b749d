//! Network and usage aware pass planning

use serde::{Deserialize, Serialize};

use super::network::{NetworkClass, NetworkState};
use crate::models::{BackgroundSyncConfig, DataUsage, RecordDomain};

/// Payload compression the transport should apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    Fast,
    Balanced,
    Maximum,
}

/// Advisory limits for one pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlan {
    /// Records uploaded per domain at most
    pub batch_size: usize,
    pub compression: CompressionLevel,
    /// Domains in processing order
    pub priority: Vec<RecordDomain>,
    /// Defer payloads above the large-payload threshold
    pub skip_large_files: bool,
}

const fn base_batch(class: NetworkClass) -> usize {
    match class {
        NetworkClass::Wifi | NetworkClass::Ethernet => 100,
        NetworkClass::Cellular5g => 75,
        NetworkClass::Cellular4g => 50,
        NetworkClass::Cellular3g => 20,
        NetworkClass::Cellular2g => 5,
        NetworkClass::Unknown | NetworkClass::None => 10,
    }
}

const fn compression_for(class: NetworkClass) -> CompressionLevel {
    match class {
        NetworkClass::Wifi | NetworkClass::Ethernet => CompressionLevel::Fast,
        NetworkClass::Cellular5g | NetworkClass::Cellular4g => CompressionLevel::Balanced,
        _ => CompressionLevel::Maximum,
    }
}

/// Plan a pass from the current network, today's usage and the user config
#[allow(clippy::cast_precision_loss)]
pub fn optimize(
    network: &NetworkState,
    usage: &DataUsage,
    daily_cap_bytes: u64,
    config: &BackgroundSyncConfig,
) -> SyncPlan {
    let usage_ratio = usage.total_bytes() as f64 / daily_cap_bytes.max(1) as f64;
    let low_battery = network.low_battery();

    let mut batch_size = base_batch(network.class);
    if usage_ratio > 0.9 {
        batch_size /= 4;
    } else if usage_ratio > 0.75 {
        batch_size /= 2;
    }
    if low_battery {
        batch_size /= 2;
    }

    SyncPlan {
        batch_size: batch_size.max(1),
        compression: compression_for(network.class),
        priority: config.domain_order(),
        skip_large_files: usage_ratio >= 0.9 || network.class.is_poor() || low_battery,
    }
}
