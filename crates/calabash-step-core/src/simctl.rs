//! Simulator lookup through Apple's `xcrun simctl` command-line tool.
//!
//! The registry is read with `xcrun simctl list devices -j` and grouped by OS
//! runtime. A device is then picked either for an exact runtime
//! ([`Simctl::find_simulator`]) or for the newest runtime that carries it
//! ([`Simctl::find_latest_simulator`]).
//!
//! # Requirements
//!
//! Xcode must be installed for `xcrun simctl` to be available.
//!
//! # Example
//!
//! ```no_run
//! use calabash_step_core::command::SystemRunner;
//! use calabash_step_core::simctl::Simctl;
//!
//! let (sim, version) = Simctl::find_latest_simulator(&SystemRunner, "iOS", "iPhone 15").unwrap();
//! println!("{} ({}) on {}", sim.name, sim.udid, version);
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::command::{CommandError, CommandRunner, CommandSpec};

/// Platform assumed when a requested OS version carries no platform name.
pub const DEFAULT_PLATFORM: &str = "iOS";

const RUNTIME_ID_PREFIX: &str = "com.apple.CoreSimulator.SimRuntime.";

/// Device names whose simulators run the 32-bit `i386` architecture.
const LEGACY_32BIT_DEVICES: &[&str] = &[
    "iPhone 4s",
    "iPhone 5",
    "iPhone 5c",
    "iPad 2",
    "iPad Retina",
    "iPad (3rd generation)",
    "iPad (4th generation)",
    "iPad mini",
];

/// Errors that can occur when looking up simulators.
#[derive(Error, Debug)]
pub enum SimctlError {
    /// A simctl command failed to execute successfully.
    #[error("simctl command failed: {0}")]
    Command(#[from] CommandError),

    /// Failed to parse JSON output from simctl.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The requested OS version is not of the form `iOS 10.3` or `10.3`.
    #[error("invalid OS version: {0}")]
    InvalidVersion(String),

    /// No available simulator matched the device on the requested runtime.
    #[error("no simulator found with name: {device}, os: {os}")]
    NotFound { device: String, os: String },
}

/// A simulator descriptor as reported by `xcrun simctl list devices -j`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorInfo {
    /// The unique device identifier (UDID) for this simulator.
    pub udid: String,

    /// The human-readable name of the device (e.g., "iPhone 15 Pro").
    pub name: String,

    /// The current state of the device (e.g., "Booted", "Shutdown").
    pub state: String,

    /// Reported by Xcode 10.1 and later.
    #[serde(rename = "isAvailable", default, skip_serializing_if = "Option::is_none")]
    pub is_available: Option<bool>,

    /// Reported by older Xcode versions, e.g. `(available)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
}

impl SimulatorInfo {
    /// Whether simctl considers the device usable. Devices without any
    /// availability information count as available.
    pub fn is_available(&self) -> bool {
        match (self.is_available, &self.availability) {
            (Some(flag), _) => flag,
            (None, Some(text)) => !text.contains("unavailable"),
            (None, None) => true,
        }
    }
}

/// An OS name plus a dotted numeric version, e.g. `iOS 17.2`.
///
/// Versions compare component-wise as numbers with missing components read
/// as zero, so `iOS 10.10 > iOS 10.9` and `iOS 11 == iOS 11.0`.
#[derive(Debug, Clone, Eq)]
pub struct OsVersion {
    pub platform: String,
    pub components: Vec<u64>,
}

impl OsVersion {
    /// Parses a runtime key from the simctl JSON. Both the identifier form
    /// (`com.apple.CoreSimulator.SimRuntime.iOS-17-0`) and the display form
    /// (`iOS 10.3`) are accepted.
    pub fn from_runtime_key(key: &str) -> Option<Self> {
        if let Some(id) = key.strip_prefix(RUNTIME_ID_PREFIX) {
            let mut parts = id.split('-');
            let platform = parts.next().filter(|p| !p.is_empty())?;
            let components = parse_components(parts)?;
            return Some(Self {
                platform: platform.to_string(),
                components,
            });
        }
        key.parse().ok()
    }

    fn compare_components(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| {
                let a = self.components.get(i).copied().unwrap_or(0);
                let b = other.components.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

fn parse_components<'a>(parts: impl Iterator<Item = &'a str>) -> Option<Vec<u64>> {
    let components = parts
        .map(|p| p.trim().parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    if components.is_empty() {
        None
    } else {
        Some(components)
    }
}

impl FromStr for OsVersion {
    type Err = SimctlError;

    /// Parses `iOS 10.3`, or a bare `10.3` which defaults to iOS.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (platform, version) = match s.rsplit_once(' ') {
            Some((platform, version)) => (platform.trim(), version),
            None => (DEFAULT_PLATFORM, s),
        };
        let components = parse_components(version.split('.'))
            .ok_or_else(|| SimctlError::InvalidVersion(s.to_string()))?;
        Ok(Self {
            platform: platform.to_string(),
            components,
        })
    }
}

impl PartialEq for OsVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for OsVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OsVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.platform
            .cmp(&other.platform)
            .then_with(|| self.compare_components(other))
    }
}

impl fmt::Display for OsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = self
            .components
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "{} {}", self.platform, version)
    }
}

/// All simulators of one OS runtime.
#[derive(Debug, Clone)]
pub struct Runtime {
    pub os: OsVersion,
    pub devices: Vec<SimulatorInfo>,
}

impl Runtime {
    fn available_device(&self, name: &str) -> Option<&SimulatorInfo> {
        self.devices
            .iter()
            .find(|d| d.name == name && d.is_available())
    }
}

#[derive(Debug, Deserialize)]
struct DeviceList {
    devices: HashMap<String, Vec<SimulatorInfo>>,
}

/// Wrapper for `xcrun simctl` queries.
pub struct Simctl;

impl Simctl {
    /// Lists every simulator runtime with its devices, ordered by OS version.
    ///
    /// # Errors
    ///
    /// - [`SimctlError::Command`] if `xcrun simctl` cannot be run or fails
    /// - [`SimctlError::JsonParse`] if the output cannot be parsed as JSON
    pub fn list_runtimes(runner: &dyn CommandRunner) -> Result<Vec<Runtime>, SimctlError> {
        let cmd = CommandSpec::new("xcrun").args(&["simctl", "list", "devices", "-j"]);
        let output = runner.output(&cmd)?;
        Self::parse_device_list(output.as_bytes())
    }

    /// Finds the simulator named `device` on the runtime `os_version`
    /// (`iOS 10.3` or `10.3`).
    pub fn find_simulator(
        runner: &dyn CommandRunner,
        os_version: &str,
        device: &str,
    ) -> Result<SimulatorInfo, SimctlError> {
        let wanted: OsVersion = os_version.parse()?;
        let runtimes = Self::list_runtimes(runner)?;
        Self::find_in(&runtimes, &wanted, device).cloned()
    }

    /// Finds the simulator named `device` on the newest `platform` runtime
    /// that has one, returning it with that runtime's version.
    pub fn find_latest_simulator(
        runner: &dyn CommandRunner,
        platform: &str,
        device: &str,
    ) -> Result<(SimulatorInfo, OsVersion), SimctlError> {
        let runtimes = Self::list_runtimes(runner)?;
        Self::find_latest_in(&runtimes, platform, device)
            .map(|(info, os)| (info.clone(), os.clone()))
    }

    /// Parses `simctl list devices -j` output into runtimes ordered by OS
    /// version. Runtime keys that are not recognizable are skipped.
    pub fn parse_device_list(json: &[u8]) -> Result<Vec<Runtime>, SimctlError> {
        let device_list: DeviceList = serde_json::from_slice(json)?;
        let mut runtimes: Vec<Runtime> = device_list
            .devices
            .into_iter()
            .filter_map(|(key, devices)| match OsVersion::from_runtime_key(&key) {
                Some(os) => Some(Runtime { os, devices }),
                None => {
                    debug!(runtime = %key, "skipping unrecognized runtime");
                    None
                }
            })
            .collect();
        runtimes.sort_by(|a, b| a.os.cmp(&b.os));
        Ok(runtimes)
    }

    /// Finds an available device by exact name on the given runtime.
    pub fn find_in<'a>(
        runtimes: &'a [Runtime],
        os: &OsVersion,
        device: &str,
    ) -> Result<&'a SimulatorInfo, SimctlError> {
        runtimes
            .iter()
            .filter(|r| r.os == *os)
            .find_map(|r| r.available_device(device))
            .ok_or_else(|| SimctlError::NotFound {
                device: device.to_string(),
                os: os.to_string(),
            })
    }

    /// Finds an available device by exact name on the highest runtime of
    /// `platform` that has it.
    pub fn find_latest_in<'a>(
        runtimes: &'a [Runtime],
        platform: &str,
        device: &str,
    ) -> Result<(&'a SimulatorInfo, &'a OsVersion), SimctlError> {
        runtimes
            .iter()
            .filter(|r| r.os.platform == platform)
            .filter_map(|r| r.available_device(device).map(|d| (d, &r.os)))
            .max_by(|a, b| a.1.cmp(b.1))
            .ok_or_else(|| SimctlError::NotFound {
                device: device.to_string(),
                os: format!("{} latest", platform),
            })
    }

    /// Renders runtimes for display: a `-- <os> --` header per runtime
    /// followed by one `udid -- name (state)` line per device.
    pub fn format_runtimes(runtimes: &[Runtime]) -> String {
        let mut out = String::new();
        for runtime in runtimes {
            out.push_str(&format!("-- {} --\n", runtime.os));
            for device in &runtime.devices {
                out.push_str(&format!("{} -- {} ({})", device.udid, device.name, device.state));
                if !device.is_available() {
                    out.push_str(" [unavailable]");
                }
                out.push('\n');
            }
        }
        out
    }

    /// Whether simulators of this device type run a 64-bit architecture.
    pub fn is_64bit_architecture(device: &str) -> bool {
        !LEGACY_32BIT_DEVICES.contains(&device)
    }
}
