//
// Raw report layouts as they arrive on the report multicast address.
//
// Every report starts with a two byte identification: the report number and the
// report family, e.g. `01 C4` for the status report. All multi byte values that
// follow are little endian.
//

use std::mem::size_of;
use thiserror::Error;

use super::{Beacon, parse_beacon};
use crate::util::{c_string, c_wide_string};

pub const REPORT_01_C4_18: u16 = 0x01c4;
pub const REPORT_02_C4_99: u16 = 0x02c4;
pub const REPORT_03_C4_129: u16 = 0x03c4;
pub const REPORT_04_C4_66: u16 = 0x04c4;
pub const REPORT_06_C4_68_OR_74: u16 = 0x06c4;
pub const REPORT_08_C4_18_OR_21_OR_22_OR_32: u16 = 0x08c4;
pub const REPORT_12_C4_14: u16 = 0x12c4;
pub const REPORT_01_B2_BEACON: u16 = 0x01b2;

/// Errors that can occur when decoding a report or spoke frame
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Report {id:04X} too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        id: u16,
        expected: usize,
        actual: usize,
    },

    #[error("Packet of {0} bytes is not a report")]
    NotAReport(usize),

    #[error("Report {id:04X} has invalid length {len}")]
    InvalidLength { id: u16, len: usize },

    #[error("Frame too short: {0} bytes")]
    FrameTooShort(usize),

    #[error("Deserialization failed: {0}")]
    Deserialize(String),
}

impl From<bincode::Error> for DecodeError {
    fn from(e: bincode::Error) -> Self {
        DecodeError::Deserialize(e.to_string())
    }
}

/// Marks report layouts that may be read straight from the wire.
///
/// # Safety
/// Implementors must be `#[repr(packed)]` and consist only of `u8`, `i8` and byte
/// arrays, so every bit pattern is a valid value.
unsafe trait WireLayout: Copy {}

fn read_layout<T: WireLayout>(id: u16, bytes: &[u8]) -> Result<T, DecodeError> {
    let expected = size_of::<T>();
    if bytes.len() < expected {
        return Err(DecodeError::TooShort {
            id,
            expected,
            actual: bytes.len(),
        });
    }
    // Safe because of the WireLayout contract and the length check above
    Ok(unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const T) })
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(packed)]
pub struct RadarReport1_18 {
    _what: u8,
    _command: u8,
    pub status: u8,
    _u00: [u8; 15], // Lots of unknown
}

unsafe impl WireLayout for RadarReport1_18 {}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(packed)]
pub struct RadarReport2_99 {
    _what: u8,
    _command: u8,
    pub range: [u8; 4],             // 2..6 = range in decimeters
    _u00: [u8; 1],                  // 6
    pub mode: u8,                   // 7 = mode
    pub gain_auto: u8,              // 8
    _u01: [u8; 3],                  // 9..12
    pub gain: u8,                   // 12
    pub sea_auto: u8,               // 13 = sea_auto, 0 = off, 1 = harbor, 2 = offshore
    _u02: [u8; 3],                  // 14..17
    pub sea: [u8; 4],               // 17..21
    _u03: u8,                       // 21
    pub rain: u8,                   // 22
    _u04: [u8; 11],                 // 23..34
    pub interference_rejection: u8, // 34
    _u05: [u8; 3],                  // 35..38
    pub target_expansion: u8,       // 38
    _u06: [u8; 3],                  // 39..42
    pub target_boost: u8,           // 42
    _u07: [u8; 56],                 // 43..99
}

unsafe impl WireLayout for RadarReport2_99 {}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(packed)]
pub struct RadarReport3_129 {
    _what: u8,
    _command: u8,
    pub model: u8,               // So far: 01 = 4G and new 3G, 08 = 3G, 0E and 0F = BR24, 00 = HALO
    _u00: [u8; 31],              // Lots of unknown
    pub hours: [u8; 4],          // Hours of operation
    _u01: [u8; 20],              // Lots of unknown
    pub firmware_date: [u8; 32], // Wide chars, assumed UTF16
    pub firmware_time: [u8; 32], // Wide chars, assumed UTF16
    _u02: [u8; 7],
}

unsafe impl WireLayout for RadarReport3_129 {}

impl RadarReport3_129 {
    pub fn firmware(&self) -> String {
        let firmware_date = self.firmware_date;
        let firmware_time = self.firmware_time;
        format!(
            "{} {}",
            c_wide_string(&firmware_date),
            c_wide_string(&firmware_time)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(packed)]
pub struct RadarReport4_66 {
    _what: u8,
    _command: u8,
    _u00: [u8; 4],                  // 2..6
    pub bearing_alignment: [u8; 2], // 6..8
    _u01: [u8; 2],                  // 8..10
    pub antenna_height: [u8; 2],    // 10..12 = Antenna height in mm
    _u02: [u8; 7],                  // 12..19
    pub accent_light: u8,           // 19 = Accent light
    _u03: [u8; 46],                 // 20..66
}

unsafe impl WireLayout for RadarReport4_66 {}

#[derive(Debug, Copy, Clone, PartialEq)]
#[repr(packed)]
pub struct SectorBlankingReport {
    pub enabled: u8,
    pub start_angle: [u8; 2],
    pub end_angle: [u8; 2],
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(packed)]
pub struct RadarReport6_68 {
    _what: u8,
    _command: u8,
    _u00: [u8; 4],                           // 2..6
    pub name: [u8; 6],                       // 6..12
    _u01: [u8; 24],                          // 12..36
    pub blanking: [SectorBlankingReport; 4], // 36..56
    _u02: [u8; 12],                          // 56..68
}

unsafe impl WireLayout for RadarReport6_68 {}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(packed)]
pub struct RadarReport6_74 {
    _what: u8,
    _command: u8,
    _u00: [u8; 4],                           // 2..6
    pub name: [u8; 6],                       // 6..12
    _u01: [u8; 30],                          // 12..42
    pub blanking: [SectorBlankingReport; 4], // 42..62
    _u02: [u8; 12],                          // 62..74
}

unsafe impl WireLayout for RadarReport6_74 {}

/// Blanking (No Transmit) report, in the HALO 2006 (68 bytes) or
/// HALO 24 firmware 2023 (74 bytes) layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlankingReport {
    Short(RadarReport6_68),
    Long(RadarReport6_74),
}

impl BlankingReport {
    pub fn name(&self) -> Option<String> {
        let name = match self {
            BlankingReport::Short(r) => r.name,
            BlankingReport::Long(r) => r.name,
        };
        c_string(&name).map(|s| s.to_string())
    }

    pub fn sectors(&self) -> [SectorBlankingReport; 4] {
        match self {
            BlankingReport::Short(r) => r.blanking,
            BlankingReport::Long(r) => r.blanking,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
#[repr(packed)]
pub struct RadarReport8_18 {
    // 08 c4  length 18
    _what: u8,                      // 0  0x08
    _command: u8,                   // 1  0xC4
    pub sea_state: u8,              // 2
    pub interference_rejection: u8, // 3
    pub scan_speed: u8,             // 4
    pub sls_auto: u8,               // 5 installation: sidelobe suppression auto
    _field6: u8,                    // 6
    _field7: u8,                    // 7
    _field8: u8,                    // 8
    pub side_lobe_suppression: u8,  // 9 installation: sidelobe suppression
    _field10: [u8; 2],              // 10-11
    pub noise_rejection: u8,        // 12    noise rejection
    pub target_sep: u8,             // 13
    pub sea_clutter: u8,            // 14 sea clutter on Halo
    pub auto_sea_clutter: i8,       // 15 auto sea clutter on Halo
    _field13: u8,                   // 16
    _field14: u8,                   // 17
}

unsafe impl WireLayout for RadarReport8_18 {}

#[derive(Debug, Copy, Clone, PartialEq)]
#[repr(packed)]
pub struct RadarReport8_21 {
    _old: RadarReport8_18,
    pub doppler_state: u8,
    pub doppler_speed: [u8; 2], // doppler speed threshold in values 0..1594 (in cm/s).
}

unsafe impl WireLayout for RadarReport8_21 {}

/// The filter report comes in four lengths. Anything of at least 21 bytes carries
/// the doppler fields, which only HALO radars have.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterReport {
    pub base: RadarReport8_18,
    pub doppler: Option<RadarReport8_21>,
    pub len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(packed)]
pub struct RadarReport12_14 {
    _what: u8,
    _command: u8,
    pub serial_no: [u8; 12],
}

unsafe impl WireLayout for RadarReport12_14 {}

impl RadarReport12_14 {
    pub fn serial_no(&self) -> String {
        let serial_no = self.serial_no;
        c_string(&serial_no).unwrap_or("").trim().to_string()
    }
}

/// A single decoded report.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Status(RadarReport1_18),
    Settings(RadarReport2_99),
    System(RadarReport3_129),
    Spatial(RadarReport4_66),
    Blanking(BlankingReport),
    Filters(FilterReport),
    Serial(RadarReport12_14),
    Beacon(Beacon),
    /// Valid framing, but a report we do not interpret
    Other(u16),
}

pub fn report_id(data: &[u8]) -> Option<u16> {
    if data.len() < 2 {
        return None;
    }
    Some(u16::from_be_bytes([data[0], data[1]]))
}

pub fn decode_report(data: &[u8]) -> Result<Report, DecodeError> {
    let id = report_id(data).ok_or(DecodeError::NotAReport(data.len()))?;

    let report = match id {
        REPORT_01_C4_18 => Report::Status(read_layout(id, data)?),
        REPORT_02_C4_99 => Report::Settings(read_layout(id, data)?),
        REPORT_03_C4_129 => Report::System(read_layout(id, data)?),
        REPORT_04_C4_66 => Report::Spatial(read_layout(id, data)?),
        REPORT_06_C4_68_OR_74 => {
            if data.len() >= size_of::<RadarReport6_74>() {
                Report::Blanking(BlankingReport::Long(read_layout(id, data)?))
            } else {
                Report::Blanking(BlankingReport::Short(read_layout(id, data)?))
            }
        }
        REPORT_08_C4_18_OR_21_OR_22_OR_32 => {
            let base: RadarReport8_18 = read_layout(id, data)?;
            let doppler = if data.len() >= size_of::<RadarReport8_21>() {
                Some(read_layout::<RadarReport8_21>(id, data)?)
            } else {
                None
            };
            Report::Filters(FilterReport {
                base,
                doppler,
                len: data.len(),
            })
        }
        REPORT_12_C4_14 => Report::Serial(read_layout(id, data)?),
        REPORT_01_B2_BEACON => match parse_beacon(data, false)? {
            Some(beacon) => Report::Beacon(beacon),
            None => Report::Other(id),
        },
        _ => Report::Other(id),
    };

    Ok(report)
}

/// The most recent raw decode of each report family.
#[derive(Debug, Clone, Default)]
pub struct RawReports {
    pub status: Option<RadarReport1_18>,
    pub settings: Option<RadarReport2_99>,
    pub system: Option<RadarReport3_129>,
    pub spatial: Option<RadarReport4_66>,
    pub blanking: Option<BlankingReport>,
    pub filters: Option<FilterReport>,
    pub serial: Option<RadarReport12_14>,
}

impl RawReports {
    pub fn store(&mut self, report: &Report) {
        match report {
            Report::Status(r) => self.status = Some(*r),
            Report::Settings(r) => self.settings = Some(*r),
            Report::System(r) => self.system = Some(*r),
            Report::Spatial(r) => self.spatial = Some(*r),
            Report::Blanking(r) => self.blanking = Some(*r),
            Report::Filters(r) => self.filters = Some(*r),
            Report::Serial(r) => self.serial = Some(*r),
            Report::Beacon(_) | Report::Other(_) => {}
        }
    }
}
