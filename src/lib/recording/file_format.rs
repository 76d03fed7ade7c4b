//
// Raw recording file format. A file is a sequence of frames:
//
//   "FH" timestamp:u32 spoke_count:u8 range:u16 heading:u16 gain:u16
//   spoke_count times:
//   "SD" spoke_number:u16 angle:u16 data:[u8; 512]
//
// All multi-byte values are little-endian.
//

use std::io::{self, ErrorKind, Read, Write};

use crate::navico::RADAR_LINE_DATA_LENGTH;
use crate::navico::data::{Frame, unpack_nibbles};

pub const FRAME_MARKER: [u8; 2] = *b"FH";
pub const SPOKE_MARKER: [u8; 2] = *b"SD";

pub const FRAME_HEADER_SIZE: usize = 2 + 4 + 1 + 2 + 2 + 2;
pub const SPOKE_RECORD_SIZE: usize = 2 + 2 + 2 + RADAR_LINE_DATA_LENGTH;

/// Heading value stored when the radar reports no true heading.
pub const NO_HEADING: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Seconds since the Unix epoch
    pub timestamp: u32,
    pub spoke_count: u8,
    /// Range in meters, saturated at 65535
    pub range: u16,
    pub heading: u16,
    pub gain: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpokeRecord {
    pub spoke_number: u16,
    pub angle: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    pub header: FrameHeader,
    pub spokes: Vec<SpokeRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelDepth {
    /// Two samples per byte, low nibble first
    Four,
    Eight,
}

impl SpokeRecord {
    pub fn samples(&self, depth: PixelDepth) -> Vec<u8> {
        match depth {
            PixelDepth::Four => unpack_nibbles(&self.data),
            PixelDepth::Eight => self.data.clone(),
        }
    }
}

impl FrameRecord {
    /// Build a record from the given spokes of a decoded frame.
    pub fn new(frame: &Frame, spokes: usize, timestamp: u32, gain: u16) -> Self {
        let spokes = &frame.spokes[..spokes.min(frame.spokes.len()).min(u8::MAX as usize)];
        let (range, heading) = match spokes.first() {
            Some(first) => (
                first.range.min(u16::MAX as u32) as u16,
                first.heading.unwrap_or(NO_HEADING),
            ),
            None => (0, NO_HEADING),
        };

        FrameRecord {
            header: FrameHeader {
                timestamp,
                spoke_count: spokes.len() as u8,
                range,
                heading,
                gain,
            },
            spokes: spokes
                .iter()
                .map(|s| SpokeRecord {
                    spoke_number: s.scan_number,
                    angle: s.angle,
                    data: s.data.clone(),
                })
                .collect(),
        }
    }
}

/// Nothing is written unless every spoke is valid, so a bad frame never leaves
/// a partial record behind.
pub fn write_frame<W: Write>(w: &mut W, frame: &FrameRecord) -> io::Result<()> {
    let h = &frame.header;
    if h.spoke_count as usize != frame.spokes.len() {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!(
                "header announces {} spokes, frame has {}",
                h.spoke_count,
                frame.spokes.len()
            ),
        ));
    }
    if let Some(spoke) = frame
        .spokes
        .iter()
        .find(|s| s.data.len() != RADAR_LINE_DATA_LENGTH)
    {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("spoke with {} data bytes", spoke.data.len()),
        ));
    }

    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + frame.spokes.len() * SPOKE_RECORD_SIZE);
    buf.extend_from_slice(&FRAME_MARKER);
    buf.extend_from_slice(&h.timestamp.to_le_bytes());
    buf.push(h.spoke_count);
    buf.extend_from_slice(&h.range.to_le_bytes());
    buf.extend_from_slice(&h.heading.to_le_bytes());
    buf.extend_from_slice(&h.gain.to_le_bytes());

    for spoke in &frame.spokes {
        buf.extend_from_slice(&SPOKE_MARKER);
        buf.extend_from_slice(&spoke.spoke_number.to_le_bytes());
        buf.extend_from_slice(&spoke.angle.to_le_bytes());
        buf.extend_from_slice(&spoke.data);
    }
    w.write_all(&buf)
}

fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

/// Read the next frame. Returns `Ok(None)` at a clean end of file.
pub fn read_frame<R: Read>(r: &mut R) -> io::Result<Option<FrameRecord>> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    match r.read_exact(&mut header[..1]) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    r.read_exact(&mut header[1..])?;
    if header[0..2] != FRAME_MARKER {
        return Err(io::Error::new(
            ErrorKind::InvalidData,
            format!("expected frame marker, got {:02X?}", &header[0..2]),
        ));
    }

    let header = FrameHeader {
        timestamp: u32::from_le_bytes([header[2], header[3], header[4], header[5]]),
        spoke_count: header[6],
        range: read_u16(&header, 7),
        heading: read_u16(&header, 9),
        gain: read_u16(&header, 11),
    };

    let mut spokes = Vec::with_capacity(header.spoke_count as usize);
    let mut record = [0u8; SPOKE_RECORD_SIZE];
    for _ in 0..header.spoke_count {
        r.read_exact(&mut record)?;
        if record[0..2] != SPOKE_MARKER {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("expected spoke marker, got {:02X?}", &record[0..2]),
            ));
        }
        spokes.push(SpokeRecord {
            spoke_number: read_u16(&record, 2),
            angle: read_u16(&record, 4),
            data: record[6..].to_vec(),
        });
    }

    Ok(Some(FrameRecord { header, spokes }))
}
