//! Bridge configuration.
//!
//! `BridgeConfig` gathers everything the coordinator and daemon need. It can
//! be built in code with the `with_*` builders or loaded from an INI file:
//!
//! ```text
//! [watch]
//! interval_ms = 5000
//! high_accuracy_displacement_m = 5
//! balanced_displacement_m = 10
//!
//! [settings]
//! resolution_policy = await
//!
//! [permissions]
//! require = coarse,fine
//!
//! [daemon]
//! command_capacity = 64
//! ```
//!
//! Missing keys keep their defaults; a missing file yields the defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;

use crate::device::Permission;
use crate::error::ConfigError;

/// Default watch update interval.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_millis(5000);

/// Default minimum displacement for high-accuracy watches, in meters.
pub const DEFAULT_HIGH_ACCURACY_DISPLACEMENT_M: f32 = 5.0;

/// Default minimum displacement for balanced watches, in meters.
pub const DEFAULT_BALANCED_DISPLACEMENT_M: f32 = 10.0;

/// Default capacity of the daemon's host message channel.
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;

/// What to do after showing the settings resolution dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionPolicy {
    /// Wait for the dialog's answer before issuing the request.
    #[default]
    AwaitResult,
    /// Issue the request right after showing the dialog.
    Optimistic,
}

impl FromStr for ResolutionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "await" | "await_result" => Ok(ResolutionPolicy::AwaitResult),
            "optimistic" => Ok(ResolutionPolicy::Optimistic),
            other => Err(format!("unknown resolution policy '{}'", other)),
        }
    }
}

/// Provider request shaping for watches.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
    /// Update interval used when the caller passes zero.
    pub interval: Duration,
    /// Minimum displacement between high-accuracy updates.
    pub high_accuracy_displacement_m: f32,
    /// Minimum displacement between balanced updates.
    pub balanced_displacement_m: f32,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_WATCH_INTERVAL,
            high_accuracy_displacement_m: DEFAULT_HIGH_ACCURACY_DISPLACEMENT_M,
            balanced_displacement_m: DEFAULT_BALANCED_DISPLACEMENT_M,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub watch: WatchConfig,
    pub resolution_policy: ResolutionPolicy,
    /// Permissions every request requires.
    pub permissions: Vec<Permission>,
    /// Capacity of the daemon's host message channel.
    pub command_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            watch: WatchConfig::default(),
            resolution_policy: ResolutionPolicy::default(),
            permissions: vec![Permission::CoarseLocation, Permission::FineLocation],
            command_capacity: DEFAULT_COMMAND_CAPACITY,
        }
    }
}

impl BridgeConfig {
    /// Load from the default path, falling back to defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from a specific path. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        Self::from_ini(&ini)
    }

    /// Overlay the values found in `ini` on top of the defaults.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("watch")) {
            if let Some(v) = section.get("interval_ms") {
                let ms: u64 = parse_value("watch", "interval_ms", v, "expected milliseconds")?;
                config.watch.interval = Duration::from_millis(ms);
            }
            if let Some(v) = section.get("high_accuracy_displacement_m") {
                config.watch.high_accuracy_displacement_m =
                    parse_value("watch", "high_accuracy_displacement_m", v, "expected meters")?;
            }
            if let Some(v) = section.get("balanced_displacement_m") {
                config.watch.balanced_displacement_m =
                    parse_value("watch", "balanced_displacement_m", v, "expected meters")?;
            }
        }

        if let Some(section) = ini.section(Some("settings")) {
            if let Some(v) = section.get("resolution_policy") {
                config.resolution_policy =
                    v.parse().map_err(|reason| ConfigError::InvalidValue {
                        section: "settings".to_string(),
                        key: "resolution_policy".to_string(),
                        value: v.to_string(),
                        reason,
                    })?;
            }
        }

        if let Some(section) = ini.section(Some("permissions")) {
            if let Some(v) = section.get("require") {
                config.permissions = v
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        s.parse().map_err(|reason| ConfigError::InvalidValue {
                            section: "permissions".to_string(),
                            key: "require".to_string(),
                            value: v.to_string(),
                            reason,
                        })
                    })
                    .collect::<Result<_, _>>()?;
            }
        }

        if let Some(section) = ini.section(Some("daemon")) {
            if let Some(v) = section.get("command_capacity") {
                let capacity: usize =
                    parse_value("daemon", "command_capacity", v, "expected a count")?;
                config.command_capacity = capacity.max(1);
            }
        }

        Ok(config)
    }

    pub fn with_watch_interval(mut self, interval: Duration) -> Self {
        self.watch.interval = interval;
        self
    }

    pub fn with_resolution_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.resolution_policy = policy;
        self
    }

    pub fn with_permissions(mut self, permissions: Vec<Permission>) -> Self {
        self.permissions = permissions;
        self
    }
}

/// `~/.config/geobridge/config.ini` (platform equivalent).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("geobridge").join("config.ini"))
}

fn parse_value<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_legacy_watch_shape() {
        let config = BridgeConfig::default();
        assert_eq!(config.watch.interval, Duration::from_millis(5000));
        assert_eq!(config.watch.high_accuracy_displacement_m, 5.0);
        assert_eq!(config.watch.balanced_displacement_m, 10.0);
        assert_eq!(config.resolution_policy, ResolutionPolicy::AwaitResult);
        assert_eq!(
            config.permissions,
            vec![Permission::CoarseLocation, Permission::FineLocation]
        );
    }

    #[test]
    fn test_from_ini_overlays_values() {
        let ini = Ini::load_from_str(
            "[watch]\ninterval_ms = 2000\nbalanced_displacement_m = 25\n\
             [settings]\nresolution_policy = optimistic\n\
             [permissions]\nrequire = fine\n\
             [daemon]\ncommand_capacity = 8\n",
        )
        .unwrap();

        let config = BridgeConfig::from_ini(&ini).unwrap();
        assert_eq!(config.watch.interval, Duration::from_millis(2000));
        assert_eq!(config.watch.balanced_displacement_m, 25.0);
        assert_eq!(config.watch.high_accuracy_displacement_m, 5.0);
        assert_eq!(config.resolution_policy, ResolutionPolicy::Optimistic);
        assert_eq!(config.permissions, vec![Permission::FineLocation]);
        assert_eq!(config.command_capacity, 8);
    }

    #[test]
    fn test_from_ini_rejects_bad_number() {
        let ini = Ini::load_from_str("[watch]\ninterval_ms = soon\n").unwrap();
        let err = BridgeConfig::from_ini(&ini).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "interval_ms"));
    }

    #[test]
    fn test_from_ini_rejects_unknown_policy() {
        let ini = Ini::load_from_str("[settings]\nresolution_policy = maybe\n").unwrap();
        assert!(BridgeConfig::from_ini(&ini).is_err());
    }

    #[test]
    fn test_load_from_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig::load_from(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[watch]\ninterval_ms = 750").unwrap();

        let config = BridgeConfig::load_from(&path).unwrap();
        assert_eq!(config.watch.interval, Duration::from_millis(750));
    }

    #[test]
    fn test_builders() {
        let config = BridgeConfig::default()
            .with_watch_interval(Duration::from_secs(1))
            .with_resolution_policy(ResolutionPolicy::Optimistic)
            .with_permissions(vec![Permission::CoarseLocation]);

        assert_eq!(config.watch.interval, Duration::from_secs(1));
        assert_eq!(config.resolution_policy, ResolutionPolicy::Optimistic);
        assert_eq!(config.permissions.len(), 1);
    }
}
