//
// The typed view of the radar state, built from the raw reports.
//

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString, VariantNames};

use super::Model;
use super::report::{FilterReport, Report};

/// A raw code translated through one of the lookup tables below. Codes without a
/// translation are kept as `Unknown` instead of failing the whole report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code<T> {
    Known(T),
    Unknown(u8),
}

impl<T: FromPrimitive> Code<T> {
    pub fn translate(raw: u8, what: &str) -> Self {
        match T::from_u8(raw) {
            Some(v) => Code::Known(v),
            None => {
                log::warn!("Unknown {} value {}", what, raw);
                Code::Unknown(raw)
            }
        }
    }
}

impl<T: Copy> Code<T> {
    pub fn known(&self) -> Option<T> {
        match self {
            Code::Known(v) => Some(*v),
            Code::Unknown(_) => None,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Code<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Code::Known(v) => write!(f, "{}", v),
            Code::Unknown(raw) => write!(f, "Unknown({})", raw),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Display, VariantNames,
)]
pub enum Status {
    Off = 0,
    Standby = 1,
    Transmit = 2,
    SpinningUp = 5,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    FromPrimitive,
    ToPrimitive,
    Display,
    EnumString,
    VariantNames,
    Serialize,
    Deserialize,
)]
pub enum HaloMode {
    Custom = 0,
    Harbor = 1,
    Offshore = 2,
    Buoy = 3,
    Weather = 4,
    Bird = 5,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    FromPrimitive,
    ToPrimitive,
    Display,
    EnumString,
    VariantNames,
    Serialize,
    Deserialize,
)]
pub enum DopplerMode {
    None = 0,
    Both = 1,
    Approaching = 2,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    FromPrimitive,
    ToPrimitive,
    Display,
    EnumString,
    VariantNames,
    Serialize,
    Deserialize,
)]
pub enum SeaState {
    Calm = 0,
    Moderate = 1,
    Rough = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Display)]
pub enum SeaAuto {
    Off = 0,
    Harbor = 1,
    Offshore = 2,
}

/// Shared by interference rejection, local interference rejection, noise rejection,
/// target separation and the accent light.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Display, Serialize, Deserialize,
)]
pub enum Level {
    Off = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Display, Serialize, Deserialize,
)]
pub enum TargetBoost {
    Off = 0,
    Low = 1,
    High = 2,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Display, Serialize, Deserialize,
)]
pub enum ScanSpeed {
    Normal = 0,
    Medium = 1,
    MediumPlus = 2,
    Fast = 3,
}

pub fn code_of<T: ToPrimitive>(v: T) -> u8 {
    v.to_u8().unwrap_or_default()
}

/// Map 0..255 wire values to 0..100 percent.
pub fn percent(raw: u32) -> u8 {
    (raw.min(255) * 100 / 255) as u8
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusInfo {
    pub status: Code<Status>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub range_m: f64,
    pub mode: Code<HaloMode>,
    pub gain_auto: bool,
    pub gain: u8,
    pub sea_auto: Code<SeaAuto>,
    pub sea: u8,
    pub rain: u8,
    pub interference_rejection: Code<Level>,
    /// Register meaning differs between 4G (off/on) and HALO (off/low/medium/high)
    pub target_expansion: u8,
    pub target_boost: Code<TargetBoost>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemInfo {
    pub model: Model,
    pub operating_hours: u32,
    pub firmware: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spatial {
    pub bearing_alignment_deg: f64,
    pub antenna_height_m: f64,
    pub accent_light: Code<Level>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlankingSector {
    pub enabled: bool,
    pub start_deg: f64,
    pub end_deg: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Blanking {
    pub name: Option<String>,
    pub sectors: [BlankingSector; 4],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Filters {
    pub sea_state: Code<SeaState>,
    pub local_interference_rejection: Code<Level>,
    pub scan_speed: Code<ScanSpeed>,
    pub side_lobe_auto: bool,
    pub side_lobe_suppression: u8,
    pub noise_rejection: Code<Level>,
    pub target_separation: Code<Level>,
    pub halo_sea_clutter: u8,
    pub halo_auto_sea_nudge: i8,
    pub doppler_mode: Option<Code<DopplerMode>>,
    pub doppler_speed_cm_s: Option<u16>,
}

/// Typed aggregate of the last report seen in every family. A family that has
/// not been received yet is `None`; once received it keeps its last value until
/// the next report of the same family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reports {
    pub model: Model,
    pub status: Option<StatusInfo>,
    pub settings: Option<Settings>,
    pub system: Option<SystemInfo>,
    pub spatial: Option<Spatial>,
    pub blanking: Option<Blanking>,
    pub filters: Option<Filters>,
    pub serial_no: Option<String>,
}

fn deci_degrees(raw: [u8; 2]) -> f64 {
    i16::from_le_bytes(raw) as f64 / 10.0
}

impl Reports {
    pub fn power_status(&self) -> Option<Status> {
        self.status.and_then(|s| s.status.known())
    }

    pub fn update(&mut self, report: &Report) {
        match report {
            Report::Status(r) => {
                self.status = Some(StatusInfo {
                    status: Code::translate(r.status, "radar status"),
                });
            }
            Report::Settings(r) => {
                let range = r.range;
                let sea = r.sea;
                self.settings = Some(Settings {
                    range_m: i32::from_le_bytes(range) as f64 / 10.0,
                    mode: Code::translate(r.mode, "HALO mode"),
                    gain_auto: r.gain_auto > 0,
                    gain: percent(r.gain as u32),
                    sea_auto: Code::translate(r.sea_auto, "sea clutter auto"),
                    sea: percent(u32::from_le_bytes(sea)),
                    rain: percent(r.rain as u32),
                    interference_rejection: Code::translate(
                        r.interference_rejection,
                        "interference rejection",
                    ),
                    target_expansion: r.target_expansion,
                    target_boost: Code::translate(r.target_boost, "target boost"),
                });
            }
            Report::System(r) => {
                let hours = r.hours;
                let model = Model::from(r.model);
                match model {
                    Model::Unknown => {
                        log::error!("Unknown radar model 0x{:02x}", r.model);
                    }
                    // Report 08 decides between HALO and 4G
                    Model::HaloOrG4 => {
                        if self.model == Model::Unknown {
                            self.model = Model::HaloOrG4;
                        }
                    }
                    _ => self.set_model(model),
                }
                self.system = Some(SystemInfo {
                    model,
                    operating_hours: u32::from_le_bytes(hours),
                    firmware: r.firmware(),
                });
            }
            Report::Spatial(r) => {
                let height = r.antenna_height;
                self.spatial = Some(Spatial {
                    bearing_alignment_deg: deci_degrees(r.bearing_alignment),
                    antenna_height_m: u16::from_le_bytes(height) as f64 / 1000.0,
                    accent_light: Code::translate(r.accent_light, "accent light"),
                });
            }
            Report::Blanking(r) => {
                let mut sectors = [BlankingSector::default(); 4];
                for (sector, raw) in sectors.iter_mut().zip(r.sectors()) {
                    *sector = BlankingSector {
                        enabled: raw.enabled > 0,
                        start_deg: deci_degrees(raw.start_angle),
                        end_deg: deci_degrees(raw.end_angle),
                    };
                }
                self.blanking = Some(Blanking {
                    name: r.name(),
                    sectors,
                });
            }
            Report::Filters(r) => self.update_filters(r),
            Report::Serial(r) => self.serial_no = Some(r.serial_no()),
            Report::Beacon(_) | Report::Other(_) => {}
        }
    }

    fn update_filters(&mut self, r: &FilterReport) {
        if r.doppler.is_some() {
            self.set_model(Model::HALO);
        } else if self.model == Model::HaloOrG4 {
            self.set_model(Model::Gen4);
        }

        let base = r.base;
        self.filters = Some(Filters {
            sea_state: Code::translate(base.sea_state, "sea state"),
            local_interference_rejection: Code::translate(
                base.interference_rejection,
                "local interference rejection",
            ),
            scan_speed: Code::translate(base.scan_speed, "scan speed"),
            side_lobe_auto: base.sls_auto > 0,
            side_lobe_suppression: percent(base.side_lobe_suppression as u32),
            noise_rejection: Code::translate(base.noise_rejection, "noise rejection"),
            target_separation: Code::translate(base.target_sep, "target separation"),
            halo_sea_clutter: base.sea_clutter,
            halo_auto_sea_nudge: base.auto_sea_clutter,
            doppler_mode: r
                .doppler
                .map(|d| Code::translate(d.doppler_state, "doppler state")),
            doppler_speed_cm_s: r.doppler.map(|d| {
                let speed = d.doppler_speed;
                u16::from_le_bytes(speed)
            }),
        });
    }

    fn set_model(&mut self, model: Model) {
        if self.model != model {
            log::info!("Radar is model {}", model);
            self.model = model;
        }
    }
}
