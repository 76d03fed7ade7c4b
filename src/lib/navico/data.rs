use bincode::deserialize;
use serde::Deserialize;
use std::f64::consts::SQRT_2;

use super::report::DecodeError;
use super::{Model, NAVICO_SPOKE_LEN, NAVICO_SPOKES_RAW, RADAR_LINE_DATA_LENGTH, SPOKES_PER_FRAME};
use crate::util::PrintableSpoke;

/*
 Heading on radar. Observed in field:
 - BR24, no RI: 0x9234 = negative, with recognisable 1234 in hex?
 - 3G, RI, true heading: 0x45be
 - 4G, RI, mag heading: 0x07d6 = 2006 = 176,6 deg
 - 4G, RI, no heading: 0x8000 = -1 = negative
 - Halo, true heading: 0x4xxx => true
*/
const HEADING_TRUE_FLAG: u16 = 0x4000;
const HEADING_MASK: u16 = NAVICO_SPOKES_RAW - 1;

fn is_heading_true(x: u16) -> bool {
    (x & HEADING_TRUE_FLAG) != 0
}
fn is_valid_heading_value(x: u16) -> bool {
    (x & !(HEADING_TRUE_FLAG | HEADING_MASK)) == 0
}
pub fn extract_heading_value(x: u16) -> Option<u16> {
    match is_valid_heading_value(x) && is_heading_true(x) {
        true => Some(x & HEADING_MASK),
        false => None,
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[repr(packed)]
struct GenBr24Header {
    header_len: u8,       // 1 bytes
    status: u8,           // 1 bytes
    scan_number: [u8; 2], // 2 bytes
    _mark: [u8; 4],       // 4 bytes, on BR24 this is always 0x00, 0x44, 0x0d, 0x0e
    angle: [u8; 2],       // 2 bytes
    heading: [u8; 2],     // 2 bytes heading with RI-10/11. See bitmask explanation above.
    range: [u8; 4],       // 4 bytes
    _u01: [u8; 2],        // 2 bytes blank
    _u02: [u8; 2],        // 2 bytes
    _u03: [u8; 4],        // 4 bytes blank
} /* total size = 24 */

#[derive(Deserialize, Debug, Clone, Copy)]
#[repr(packed)]
struct Gen3PlusHeader {
    header_len: u8,       // 1 bytes
    status: u8,           // 1 bytes
    scan_number: [u8; 2], // 1 byte (HALO and newer), 2 bytes (4G and older)
    _mark: [u8; 2],       // 2 bytes
    large_range: [u8; 2], // 2 bytes, on 4G and up
    angle: [u8; 2],       // 2 bytes
    heading: [u8; 2],     // 2 bytes heading with RI-10/11. See bitmask explanation above.
    small_range: [u8; 2], // 2 bytes or -1
    _rotation: [u8; 2],   // 2 bytes or -1
    _u01: [u8; 4],        // 4 bytes signed integer, always -1
    _u02: [u8; 4], // 4 bytes signed integer, mostly -1 (0x80 in last byte) or 0xa0 in last byte
} /* total size = 24 */

pub const FRAME_HEADER_LENGTH: usize = 8;
pub const RADAR_LINE_HEADER_LENGTH: usize = size_of::<Gen3PlusHeader>();
pub const RADAR_LINE_LENGTH: usize = RADAR_LINE_HEADER_LENGTH + RADAR_LINE_DATA_LENGTH;

const STATUS_VALID: u8 = 0x02;
const STATUS_VALID_ALT: u8 = 0x12;

const BR24_RANGE_FACTOR: f64 = 10.0 / SQRT_2;

/// One scan line: 512 bytes holding 1024 4-bit samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Spoke {
    pub scan_number: u16,
    /// Raw azimuth, 0..4096 per rotation
    pub angle: u16,
    pub heading: Option<u16>,
    /// Range of the last sample in meters
    pub range: u32,
    pub status: u8,
    pub data: Vec<u8>,
}

/// The valid spokes of one received UDP frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub spokes: Vec<Spoke>,
    pub dropped: usize,
}

/// Range in meters from the 4G/HALO large and small range words.
pub fn gen4_range(large_range: u16, small_range: u16) -> u32 {
    if large_range == 0x80 {
        if small_range == 0xffff {
            0
        } else {
            (small_range as u32) / 4
        }
    } else {
        ((large_range as u32) * (small_range as u32)) / 512
    }
}

/// Range in meters from the BR24/3G range field.
pub fn br24_range(raw: u32) -> u32 {
    ((raw & 0xffffff) as f64 * BR24_RANGE_FACTOR) as u32
}

pub fn decode_frame(data: &[u8], model: Model) -> Result<Frame, DecodeError> {
    if data.len() < FRAME_HEADER_LENGTH + RADAR_LINE_LENGTH {
        return Err(DecodeError::FrameTooShort(data.len()));
    }

    let spokes_in_frame = (data.len() - FRAME_HEADER_LENGTH) / RADAR_LINE_LENGTH;
    if spokes_in_frame > SPOKES_PER_FRAME {
        log::warn!(
            "UDP frame with {} spokes, only using {}",
            spokes_in_frame,
            SPOKES_PER_FRAME
        );
    }
    let spokes_in_frame = spokes_in_frame.min(SPOKES_PER_FRAME);
    log::trace!("Received UDP frame with {} spokes", &spokes_in_frame);

    let mut frame = Frame {
        spokes: Vec::with_capacity(spokes_in_frame),
        dropped: 0,
    };

    let mut offset: usize = FRAME_HEADER_LENGTH;
    for scanline in 0..spokes_in_frame {
        let header_slice = &data[offset..offset + RADAR_LINE_HEADER_LENGTH];
        let spoke_slice = &data[offset + RADAR_LINE_HEADER_LENGTH..offset + RADAR_LINE_LENGTH];

        match decode_header(header_slice, model) {
            Ok(Some(mut spoke)) => {
                log::trace!(
                    "Received {:04} spoke {}",
                    scanline,
                    PrintableSpoke::new(spoke_slice)
                );
                spoke.data = spoke_slice.to_vec();
                frame.spokes.push(spoke);
            }
            Ok(None) => {
                log::debug!("Invalid spoke: header {:02X?}", &header_slice);
                frame.dropped += 1;
            }
            Err(e) => {
                log::warn!("Illegible spoke: {} header {:02X?}", e, &header_slice);
                frame.dropped += 1;
            }
        }

        offset += RADAR_LINE_LENGTH;
    }

    Ok(frame)
}

fn valid_line(header_len: u8, status: u8) -> bool {
    if header_len != (RADAR_LINE_HEADER_LENGTH as u8) {
        log::debug!("Spoke with illegal header length ({}) ignored", header_len);
        return false;
    }
    if status != STATUS_VALID && status != STATUS_VALID_ALT {
        log::debug!("Spoke with illegal status (0x{:x}) ignored", status);
        return false;
    }
    true
}

fn decode_header(header_slice: &[u8], model: Model) -> Result<Option<Spoke>, DecodeError> {
    if model.has_br24_spoke_header() {
        let header = deserialize::<GenBr24Header>(header_slice)?;
        if !valid_line(header.header_len, header.status) {
            return Ok(None);
        }
        Ok(Some(Spoke {
            scan_number: u16::from_le_bytes(header.scan_number),
            angle: u16::from_le_bytes(header.angle) % NAVICO_SPOKES_RAW,
            heading: extract_heading_value(u16::from_le_bytes(header.heading)),
            range: br24_range(u32::from_le_bytes(header.range)),
            status: header.status,
            data: Vec::new(),
        }))
    } else {
        let header = deserialize::<Gen3PlusHeader>(header_slice)?;
        if !valid_line(header.header_len, header.status) {
            return Ok(None);
        }
        Ok(Some(Spoke {
            scan_number: u16::from_le_bytes(header.scan_number),
            angle: u16::from_le_bytes(header.angle) % NAVICO_SPOKES_RAW,
            heading: extract_heading_value(u16::from_le_bytes(header.heading)),
            range: gen4_range(
                u16::from_le_bytes(header.large_range),
                u16::from_le_bytes(header.small_range),
            ),
            status: header.status,
            data: Vec::new(),
        }))
    }
}

/// Unpack 4-bit samples, low nibble first.
pub fn unpack_nibbles(spoke: &[u8]) -> Vec<u8> {
    let mut unpacked = Vec::with_capacity(NAVICO_SPOKE_LEN);
    for pixel in spoke {
        unpacked.push(pixel & 0x0f);
        unpacked.push(pixel >> 4);
    }
    unpacked
}
