use bincode::deserialize;
use serde::Deserialize;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use crate::locator::AddressSet;
use crate::navico::report::DecodeError;
use crate::network::NetworkSocketAddrV4;
use crate::util::{PrintableSlice, c_string};

pub mod command;
pub mod data;
pub mod report;
pub mod state;

// Length of a spoke in pixels. Every pixel is 4 bits (one nibble.)
pub const NAVICO_SPOKE_LEN: usize = 1024;

// Spoke angles go from [0..4096>, but only half of them are used.
pub const NAVICO_SPOKES_RAW: u16 = 4096;

const BITS_PER_BYTE: usize = 8;
const BITS_PER_NIBBLE: usize = 4;
const NAVICO_PIXELS_PER_BYTE: usize = BITS_PER_BYTE / BITS_PER_NIBBLE;
pub const RADAR_LINE_DATA_LENGTH: usize = NAVICO_SPOKE_LEN / NAVICO_PIXELS_PER_BYTE;

pub const SPOKES_PER_FRAME: usize = 120;

pub const NAVICO_BEACON_ADDRESS: SocketAddrV4 =
    SocketAddrV4::new(Ipv4Addr::new(236, 6, 7, 5), 6878);
pub const NAVICO_BR24_BEACON_ADDRESS: SocketAddrV4 =
    SocketAddrV4::new(Ipv4Addr::new(236, 6, 7, 4), 6768);

pub const NAVICO_ADDRESS_REQUEST_PACKET: [u8; 2] = [0x01, 0xB1];
pub const NAVICO_BEACON_ID: [u8; 2] = [0x01, 0xB2];

#[derive(Deserialize, Debug, Copy, Clone)]
#[repr(packed)]
struct NavicoBeaconHeader {
    _id: u16,
    serial_no: [u8; 16],             // ASCII serial number, zero terminated
    radar_addr: NetworkSocketAddrV4, // 0A 00 43 D9 01 01 = DHCP address of radar
    _filler1: [u8; 12],              // 11000000
    _addr1: NetworkSocketAddrV4,     // EC0608201970 = 236.6.8.32 port 6512
    _filler2: [u8; 4],               // 11000000
    _addr2: NetworkSocketAddrV4,     // EC0607161A26 = 236.6.8.22 port 6694
    _filler3: [u8; 10],              // 1F002001020010000000
    _addr3: NetworkSocketAddrV4,     // EC0608211971 = 236.6.8.33 port 6513
    _filler4: [u8; 4],               // 11000000
    _addr4: NetworkSocketAddrV4,     // EC0608221972 = 236.6.8.34 port 6514
}

#[derive(Deserialize, Debug, Copy, Clone)]
#[repr(packed)]
struct NavicoBeaconRadar {
    _filler1: [u8; 10],          // 10002001030010000000
    data: NetworkSocketAddrV4,   // EC0608231973 = 236.6.8.35 port 6515
    _filler2: [u8; 4],           // 11000000
    send: NetworkSocketAddrV4,   // EC0608241974 = 236.6.8.36 port 6516
    _filler3: [u8; 4],           // 12000000
    report: NetworkSocketAddrV4, // EC0608231975 = 236.6.7.35 port 6517
}

impl From<NavicoBeaconRadar> for AddressSet {
    fn from(radar: NavicoBeaconRadar) -> Self {
        AddressSet {
            data: radar.data.into(),
            report: radar.report.into(),
            send: radar.send.into(),
        }
    }
}

// Radars that have one internal radar: 3G, Halo 20, etc.
#[derive(Deserialize, Debug, Copy, Clone)]
#[repr(packed)]
struct NavicoBeaconSingle {
    header: NavicoBeaconHeader,
    a: NavicoBeaconRadar,
}

// As seen on all dual radar (4G, HALO 20+, 24, 3, etc)
#[derive(Deserialize, Debug, Copy, Clone)]
#[repr(packed)]
struct NavicoBeaconDual {
    header: NavicoBeaconHeader,
    a: NavicoBeaconRadar,
    b: NavicoBeaconRadar,
}

// The beacon message from BR24 (and first gen 3G) is _slightly_ different,
// so it needs a different structure. It is also sent to a different MultiCast address!
#[derive(Deserialize, Debug, Copy, Clone)]
#[repr(packed)]
struct BR24Beacon {
    _id: u16,
    serial_no: [u8; 16], // ASCII serial number, zero terminated
    radar_addr: NetworkSocketAddrV4,
    _filler1: [u8; 12],
    _addr1: NetworkSocketAddrV4,
    _filler2: [u8; 4],
    _addr2: NetworkSocketAddrV4,
    _filler3: [u8; 4],
    _addr3: NetworkSocketAddrV4,
    _filler4: [u8; 10],
    report: NetworkSocketAddrV4,
    _filler5: [u8; 4],
    send: NetworkSocketAddrV4,
    _filler6: [u8; 4],
    data: NetworkSocketAddrV4, // Note different order from newer radars
}

pub const NAVICO_BEACON_SINGLE_SIZE: usize = size_of::<NavicoBeaconSingle>();
pub const NAVICO_BEACON_DUAL_SIZE: usize = size_of::<NavicoBeaconDual>();
pub const NAVICO_BEACON_BR24_SIZE: usize = size_of::<BR24Beacon>();

/// The content of a 01B2 beacon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beacon {
    pub serial_no: String,
    pub radar_addr: SocketAddrV4,
    pub a: AddressSet,
    pub b: Option<AddressSet>,
}

/// Decode a beacon report. Returns `Ok(None)` for packets on the beacon group that
/// are not beacons, such as our own (or an MFD's) address request.
pub fn parse_beacon(report: &[u8], br24: bool) -> Result<Option<Beacon>, DecodeError> {
    if report.len() < 2 || report[0..2] != NAVICO_BEACON_ID {
        return Ok(None);
    }
    log::trace!("beacon printable: {}", PrintableSlice::new(report));

    let min_size = if br24 {
        NAVICO_BEACON_BR24_SIZE
    } else {
        NAVICO_BEACON_SINGLE_SIZE
    };
    if report.len() < min_size {
        return Err(DecodeError::TooShort {
            id: u16::from_be_bytes(NAVICO_BEACON_ID),
            expected: min_size,
            actual: report.len(),
        });
    }

    let beacon = if br24 {
        let data = deserialize::<BR24Beacon>(report)?;
        log::debug!("BR24Beacon {:?}", data);
        Beacon {
            serial_no: c_string(&data.serial_no).unwrap_or("").to_string(),
            radar_addr: data.radar_addr.into(),
            a: AddressSet {
                data: data.data.into(),
                report: data.report.into(),
                send: data.send.into(),
            },
            b: None,
        }
    } else if report.len() >= NAVICO_BEACON_DUAL_SIZE {
        let data = deserialize::<NavicoBeaconDual>(report)?;
        log::debug!("NavicoBeaconDual {:?}", data);
        Beacon {
            serial_no: c_string(&data.header.serial_no).unwrap_or("").to_string(),
            radar_addr: data.header.radar_addr.into(),
            a: data.a.into(),
            b: Some(data.b.into()),
        }
    } else {
        let data = deserialize::<NavicoBeaconSingle>(report)?;
        log::debug!("NavicoBeaconSingle {:?}", data);
        Beacon {
            serial_no: c_string(&data.header.serial_no).unwrap_or("").to_string(),
            radar_addr: data.header.radar_addr.into(),
            a: data.a.into(),
            b: None,
        }
    };

    Ok(Some(beacon))
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum Model {
    #[default]
    Unknown,
    BR24,
    Gen3,
    Gen4,
    HALO,
    HaloOrG4,
}

const BR24_MODEL_NAME: &str = "BR24";
const NAUTICAL_MILE: u32 = 1852;

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Model::Unknown => "",
            Model::BR24 => BR24_MODEL_NAME,
            Model::Gen3 => "3G",
            Model::Gen4 => "4G",
            Model::HALO => "HALO",
            Model::HaloOrG4 => "HALO or 4G",
        };
        write!(f, "{}", s)
    }
}

impl From<u8> for Model {
    fn from(model: u8) -> Self {
        match model {
            0x0e => Model::BR24, // Davy's NorthStar BR24 from 2009
            0x0f => Model::BR24,
            0x08 => Model::Gen3,
            0x01 => Model::HaloOrG4, // New Firmware in 2025
            0x00 => Model::HALO,
            _ => Model::Unknown,
        }
    }
}

impl Model {
    /// Largest range the scanner accepts, in meters. Unknown models get the 4G limit.
    pub fn max_range(&self) -> u32 {
        (match self {
            Model::BR24 => 24,
            Model::Gen3 => 36,
            Model::Gen4 | Model::HaloOrG4 | Model::Unknown => 48,
            Model::HALO => 96,
        }) * NAUTICAL_MILE
    }

    /// Spoke headers from BR24 and 3G carry a single 4 byte range field.
    pub fn has_br24_spoke_header(&self) -> bool {
        matches!(self, Model::BR24 | Model::Gen3)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn addr(s: &str) -> SocketAddrV4 {
        s.parse().unwrap()
    }

    fn push_addr(buf: &mut Vec<u8>, a: &str) {
        buf.extend_from_slice(&NetworkSocketAddrV4::to_bytes(&addr(a)));
    }

    fn header(buf: &mut Vec<u8>) {
        buf.extend_from_slice(&NAVICO_BEACON_ID);
        let mut serial = [0u8; 16];
        serial[..10].copy_from_slice(b"1403301583");
        buf.extend_from_slice(&serial);
        push_addr(buf, "10.0.67.217:257");
        buf.extend_from_slice(&[0x11; 12]);
        push_addr(buf, "236.6.8.32:6512");
        buf.extend_from_slice(&[0; 4]);
        push_addr(buf, "236.6.8.22:6694");
        buf.extend_from_slice(&[0; 10]);
        push_addr(buf, "236.6.8.33:6513");
        buf.extend_from_slice(&[0; 4]);
        push_addr(buf, "236.6.8.34:6514");
    }

    fn radar(buf: &mut Vec<u8>, data: &str, send: &str, report: &str) {
        buf.extend_from_slice(&[0; 10]);
        push_addr(buf, data);
        buf.extend_from_slice(&[0; 4]);
        push_addr(buf, send);
        buf.extend_from_slice(&[0; 4]);
        push_addr(buf, report);
    }

    pub(crate) fn dual_beacon() -> Vec<u8> {
        let mut buf = Vec::new();
        header(&mut buf);
        radar(&mut buf, "236.6.7.8:6678", "236.6.7.10:6680", "236.6.7.9:6679");
        radar(&mut buf, "236.6.7.13:6657", "236.6.7.14:6658", "236.6.7.15:6659");
        // Trailing sets that we don't decode
        buf.extend_from_slice(&[0; 36]);
        buf
    }

    #[test]
    fn beacon_sizes() {
        assert_eq!(NAVICO_BEACON_SINGLE_SIZE, 114);
        assert_eq!(NAVICO_BEACON_DUAL_SIZE, 150);
        assert_eq!(NAVICO_BEACON_BR24_SIZE, 98);
    }

    #[test]
    fn decode_dual_beacon() {
        let beacon = parse_beacon(&dual_beacon(), false).unwrap().unwrap();

        assert_eq!(beacon.serial_no, "1403301583");
        assert_eq!(beacon.radar_addr, addr("10.0.67.217:257"));
        assert_eq!(beacon.a.data, addr("236.6.7.8:6678"));
        assert_eq!(beacon.a.send, addr("236.6.7.10:6680"));
        assert_eq!(beacon.a.report, addr("236.6.7.9:6679"));
        let b = beacon.b.unwrap();
        assert_eq!(b.data, addr("236.6.7.13:6657"));
        assert_eq!(b.send, addr("236.6.7.14:6658"));
        assert_eq!(b.report, addr("236.6.7.15:6659"));
    }

    #[test]
    fn decode_single_beacon() {
        let mut buf = Vec::new();
        header(&mut buf);
        radar(&mut buf, "236.6.7.8:6678", "236.6.7.10:6680", "236.6.7.9:6679");

        let beacon = parse_beacon(&buf, false).unwrap().unwrap();
        assert_eq!(beacon.a.report, addr("236.6.7.9:6679"));
        assert!(beacon.b.is_none());
    }

    pub(crate) fn br24_beacon() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&NAVICO_BEACON_ID);
        buf.extend_from_slice(&[b'B'; 16]);
        push_addr(&mut buf, "10.0.0.5:257");
        buf.extend_from_slice(&[0; 12]);
        push_addr(&mut buf, "236.6.7.1:1");
        buf.extend_from_slice(&[0; 4]);
        push_addr(&mut buf, "236.6.7.2:2");
        buf.extend_from_slice(&[0; 4]);
        push_addr(&mut buf, "236.6.7.3:3");
        buf.extend_from_slice(&[0; 10]);
        push_addr(&mut buf, "236.6.7.9:6679");
        buf.extend_from_slice(&[0; 4]);
        push_addr(&mut buf, "236.6.7.10:6680");
        buf.extend_from_slice(&[0; 4]);
        push_addr(&mut buf, "236.6.7.8:6678");
        buf
    }

    #[test]
    fn decode_br24_beacon() {
        let beacon = parse_beacon(&br24_beacon(), true).unwrap().unwrap();
        assert_eq!(beacon.serial_no, "BBBBBBBBBBBBBBBB");
        assert_eq!(beacon.a.report, addr("236.6.7.9:6679"));
        assert_eq!(beacon.a.send, addr("236.6.7.10:6680"));
        assert_eq!(beacon.a.data, addr("236.6.7.8:6678"));
    }

    #[test]
    fn address_request_is_not_a_beacon() {
        assert_eq!(parse_beacon(&NAVICO_ADDRESS_REQUEST_PACKET, false), Ok(None));
        assert!(matches!(
            parse_beacon(&dual_beacon()[..100], false),
            Err(DecodeError::TooShort { .. })
        ));
    }

    #[test]
    fn model_from_byte() {
        assert_eq!(Model::from(0x00), Model::HALO);
        assert_eq!(Model::from(0x01), Model::HaloOrG4);
        assert_eq!(Model::from(0x08), Model::Gen3);
        assert_eq!(Model::from(0x0e), Model::BR24);
        assert_eq!(Model::from(0x0f), Model::BR24);
        assert_eq!(Model::from(0x42), Model::Unknown);
        assert_eq!(Model::HALO.to_string(), "HALO");
    }

    #[test]
    fn model_range_ceiling() {
        assert_eq!(Model::Unknown.max_range(), 88_896);
        assert_eq!(Model::HALO.max_range(), 177_792);
        assert_eq!(Model::BR24.max_range(), 44_448);
    }
}
