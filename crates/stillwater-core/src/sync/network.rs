//! Connectivity and battery reporting

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Kind of link the device is currently on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkClass {
    Wifi,
    Ethernet,
    Cellular5g,
    Cellular4g,
    Cellular3g,
    Cellular2g,
    Unknown,
    None,
}

impl NetworkClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Wifi => "wifi",
            Self::Ethernet => "ethernet",
            Self::Cellular5g => "5g",
            Self::Cellular4g => "4g",
            Self::Cellular3g => "3g",
            Self::Cellular2g => "2g",
            Self::Unknown => "unknown",
            Self::None => "none",
        }
    }

    /// Links a `wifi_only` configuration accepts
    pub const fn is_unmetered_or_fast(self) -> bool {
        matches!(
            self,
            Self::Wifi | Self::Ethernet | Self::Cellular5g | Self::Cellular4g
        )
    }

    /// Links slow enough that large payloads are skipped
    pub const fn is_poor(self) -> bool {
        matches!(self, Self::Cellular3g | Self::Cellular2g | Self::Unknown)
    }
}

impl fmt::Display for NetworkClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wifi" | "wi-fi" => Ok(Self::Wifi),
            "ethernet" => Ok(Self::Ethernet),
            "5g" => Ok(Self::Cellular5g),
            "4g" | "lte" => Ok(Self::Cellular4g),
            "3g" => Ok(Self::Cellular3g),
            "2g" => Ok(Self::Cellular2g),
            "unknown" => Ok(Self::Unknown),
            "none" | "offline" => Ok(Self::None),
            other => Err(Error::unknown("network class", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryState {
    /// Charge level between 0.0 and 1.0
    pub level: f32,
    pub charging: bool,
}

impl BatteryState {
    /// Below 20% and not plugged in
    pub fn is_low(&self) -> bool {
        self.level < 0.2 && !self.charging
    }
}

/// Snapshot of connectivity at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkState {
    pub connected: bool,
    pub class: NetworkClass,
    pub battery: Option<BatteryState>,
}

impl NetworkState {
    pub const fn online(class: NetworkClass) -> Self {
        Self {
            connected: !matches!(class, NetworkClass::None),
            class,
            battery: None,
        }
    }

    pub const fn offline() -> Self {
        Self {
            connected: false,
            class: NetworkClass::None,
            battery: None,
        }
    }

    #[must_use]
    pub const fn with_battery(mut self, battery: BatteryState) -> Self {
        self.battery = Some(battery);
        self
    }

    pub fn low_battery(&self) -> bool {
        self.battery.is_some_and(|battery| battery.is_low())
    }
}

/// Source of connectivity information consumed by the engine and scheduler
pub trait NetworkMonitor {
    fn current(&self) -> NetworkState;
}

/// Monitor whose state is set by the caller
#[derive(Debug)]
pub struct StaticNetworkMonitor {
    state: Mutex<NetworkState>,
}

impl StaticNetworkMonitor {
    pub const fn new(state: NetworkState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn set(&self, state: NetworkState) {
        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = state;
    }
}

impl NetworkMonitor for StaticNetworkMonitor {
    fn current(&self) -> NetworkState {
        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
