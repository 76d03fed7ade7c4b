use directories::ProjectDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::locator::Channel;
use crate::navico::state::{DopplerMode, HaloMode, Level, ScanSpeed, SeaState, TargetBoost};
use crate::radar::{Controller, RadarError};

pub const CONFIG_FILE_NAME: &str = "navico-radar.json";

pub fn get_project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("net", "navico-radar", "navico-radar")
}

/// A value with an optional automatic mode.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Adjustable {
    pub value: i32,
    #[serde(default)]
    pub auto: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BlankingSectorSetting {
    pub sector: u8,
    pub enabled: bool,
    pub start: f64,
    pub end: f64,
}

/// Radar parameters applied before every scan. Unset values are left as the
/// radar has them.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RadarSettings {
    /// Meters
    pub range: Option<u32>,
    /// Degrees
    pub bearing_alignment: Option<f64>,
    pub gain: Option<Adjustable>,
    pub sea_clutter: Option<Adjustable>,
    pub rain_clutter: Option<i32>,
    pub side_lobe_suppression: Option<Adjustable>,
    pub interference_rejection: Option<Level>,
    pub local_interference_rejection: Option<Level>,
    pub sea_state: Option<SeaState>,
    pub scan_speed: Option<ScanSpeed>,
    pub mode: Option<HaloMode>,
    pub target_expansion: Option<u8>,
    pub target_separation: Option<Level>,
    pub target_boost: Option<TargetBoost>,
    pub noise_rejection: Option<Level>,
    pub doppler: Option<DopplerMode>,
    /// cm/s
    pub doppler_speed: Option<u16>,
    pub accent_light: Option<Level>,
    /// Meters
    pub antenna_height: Option<f64>,
    pub sector_blanking: Vec<BlankingSectorSetting>,
}

impl RadarSettings {
    /// Send every configured value, then ask for reports once.
    pub async fn apply(&self, controller: &Controller) {
        if let Some(v) = self.range {
            controller.set_range(v, false).await;
        }
        if let Some(v) = self.bearing_alignment {
            controller.set_bearing_alignment(v, false).await;
        }
        if let Some(v) = self.gain {
            controller.set_gain(v.value, v.auto, false).await;
        }
        if let Some(v) = self.sea_clutter {
            controller.set_sea_clutter(v.value, v.auto, false).await;
        }
        if let Some(v) = self.rain_clutter {
            controller.set_rain_clutter(v, false).await;
        }
        if let Some(v) = self.side_lobe_suppression {
            controller
                .set_side_lobe_suppression(v.value, v.auto, false)
                .await;
        }
        if let Some(v) = self.interference_rejection {
            controller.set_interference_rejection(v, false).await;
        }
        if let Some(v) = self.local_interference_rejection {
            controller.set_local_interference_rejection(v, false).await;
        }
        if let Some(v) = self.sea_state {
            controller.set_sea_state(v, false).await;
        }
        if let Some(v) = self.scan_speed {
            controller.set_scan_speed(v, false).await;
        }
        if let Some(v) = self.mode {
            controller.set_mode(v, false).await;
        }
        if let Some(v) = self.target_expansion {
            controller.set_target_expansion(v, false).await;
        }
        if let Some(v) = self.target_separation {
            controller.set_target_separation(v, false).await;
        }
        if let Some(v) = self.target_boost {
            controller.set_target_boost(v, false).await;
        }
        if let Some(v) = self.noise_rejection {
            controller.set_noise_rejection(v, false).await;
        }
        if let Some(v) = self.doppler {
            controller.set_doppler(v, false).await;
        }
        if let Some(v) = self.doppler_speed {
            controller.set_doppler_speed(v, false).await;
        }
        if let Some(v) = self.accent_light {
            controller.set_accent_light(v, false).await;
        }
        if let Some(v) = self.antenna_height {
            controller.set_antenna_height(v, false).await;
        }
        for s in &self.sector_blanking {
            controller
                .set_sector_blanking(s.sector, s.enabled, s.start, s.end, false)
                .await;
        }
        controller.get_reports().await;
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Network interface the radar is on; the first IPv4 interface if unset
    pub interface: Option<String>,
    pub channel: Channel,
    pub locate_timeout_secs: u64,
    pub locate_retry_ms: u64,
    pub connect_timeout_secs: u64,
    pub keep_alive_interval_ms: u64,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Rotations per recording
    pub sectors_to_record: u32,
    pub scan_cycle_delay_secs: u64,
    pub scan_watchdog_secs: u64,
    pub data_watchdog_secs: u64,
    pub transmit_retries: u32,
    pub transmit_poll_ms: u64,
    pub fatal_exit_delay_secs: u64,
    pub radar: RadarSettings,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            interface: None,
            channel: Channel::A,
            locate_timeout_secs: 60,
            locate_retry_ms: 1000,
            connect_timeout_secs: 10,
            keep_alive_interval_ms: 5000,
            output_dir: PathBuf::from("data"),
            log_dir: PathBuf::from("logs"),
            sectors_to_record: 1,
            scan_cycle_delay_secs: 60,
            scan_watchdog_secs: 30,
            data_watchdog_secs: 5,
            transmit_retries: 20,
            transmit_poll_ms: 500,
            fatal_exit_delay_secs: 10,
            radar: RadarSettings::default(),
        }
    }
}

impl Config {
    pub fn locate_timeout(&self) -> Duration {
        Duration::from_secs(self.locate_timeout_secs)
    }
    pub fn locate_retry(&self) -> Duration {
        Duration::from_millis(self.locate_retry_ms)
    }
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_millis(self.keep_alive_interval_ms)
    }
    pub fn scan_cycle_delay(&self) -> Duration {
        Duration::from_secs(self.scan_cycle_delay_secs)
    }
    pub fn scan_watchdog(&self) -> Duration {
        Duration::from_secs(self.scan_watchdog_secs)
    }
    pub fn data_watchdog(&self) -> Duration {
        Duration::from_secs(self.data_watchdog_secs)
    }
    pub fn transmit_poll(&self) -> Duration {
        Duration::from_millis(self.transmit_poll_ms)
    }
    pub fn fatal_exit_delay(&self) -> Duration {
        Duration::from_secs(self.fatal_exit_delay_secs)
    }

    fn validate(self) -> Result<Self, RadarError> {
        if self.sectors_to_record == 0 {
            return Err(RadarError::Config("sectors_to_record must be at least 1".into()));
        }
        if self.data_watchdog_secs == 0 || self.scan_watchdog_secs == 0 {
            return Err(RadarError::Config("watchdog intervals must be positive".into()));
        }
        Ok(self)
    }
}

/// Resolve the config file: a directory holds `navico-radar.json`, anything else
/// is taken as the file itself. Without a path the platform config directory is used.
pub fn config_path(path: Option<&Path>) -> Result<PathBuf, RadarError> {
    match path {
        Some(path) if path.is_dir() => Ok(path.join(CONFIG_FILE_NAME)),
        Some(path) => Ok(path.to_path_buf()),
        None => get_project_dirs()
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
            .ok_or_else(|| RadarError::Config("cannot find project directories".into())),
    }
}

/// Load the configuration. A missing file gives the defaults; a file that
/// cannot be parsed is an error.
pub fn load(path: Option<&Path>) -> Result<Config, RadarError> {
    let path = config_path(path)?;

    let file = match File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("no config '{}'; using defaults", path.display());
            return Config::default().validate();
        }
        Err(e) => return Err(RadarError::Io(e)),
    };

    let config: Config = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| RadarError::Config(format!("'{}': {}", path.display(), e)))?;
    info!("Loaded config from '{}'", path.display());
    config.validate()
}
