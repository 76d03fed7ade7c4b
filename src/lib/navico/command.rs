//
// Commands sent to the radar on the send address.
//
// Commands are fire and forget: the radar never acknowledges them, the only way to
// see the effect is to request reports and look at the new state.
//

use num_traits::FromPrimitive;

use super::Model;
use super::state::{DopplerMode, HaloMode, SeaState, code_of};

pub const REQUEST_03_REPORT: [u8; 2] = [0x04, 0xc2]; // This causes the radar to report Report 3
pub const REQUEST_MANY2_REPORT: [u8; 2] = [0x01, 0xc2]; // This causes the radar to report Report 02, 03, 04, 07 and 08
pub const REQUEST_04_REPORT: [u8; 2] = [0x02, 0xc2]; // This causes the radar to report Report 4
pub const REQUEST_02_08_REPORT: [u8; 2] = [0x03, 0xc2]; // This causes the radar to report Report 2 and Report 8
pub const COMMAND_STAY_ON_A: [u8; 2] = [0xa0, 0xc1];

pub const DOPPLER_SPEED_MAX: u16 = 1594;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportRequest {
    Report03,
    Many,
    Report04,
    Report02And08,
}

impl ReportRequest {
    fn bytes(&self) -> [u8; 2] {
        match self {
            ReportRequest::Report03 => REQUEST_03_REPORT,
            ReportRequest::Many => REQUEST_MANY2_REPORT,
            ReportRequest::Report04 => REQUEST_04_REPORT,
            ReportRequest::Report02And08 => REQUEST_02_08_REPORT,
        }
    }
}

/// Sea clutter is a plain 0..255 value on older radars; HALO radars have an
/// automatic mode that can be nudged up or down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeaClutter {
    Manual(u8),
    Auto(i8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StayOn,
    RequestReport(ReportRequest),
    Power {
        transmit: bool,
    },
    Range {
        decimeters: i32,
    },
    BearingAlignment {
        deci_degrees: i16,
    },
    Gain {
        auto: bool,
        value: u8,
    },
    SeaClutter(SeaClutter),
    Rain {
        value: u8,
    },
    SideLobeSuppression {
        auto: bool,
        value: u8,
    },
    InterferenceRejection(u8),
    TargetExpansion(u8),
    TargetBoost(u8),
    SeaState(SeaState),
    LocalInterferenceRejection(u8),
    ScanSpeed(u8),
    Mode(HaloMode),
    NoiseRejection(u8),
    TargetSeparation(u8),
    Doppler(DopplerMode),
    DopplerSpeed {
        cm_per_s: u16,
    },
    AntennaHeight {
        millimeters: u16,
    },
    AccentLight(u8),
    SectorBlanking {
        sector: u8,
        enabled: bool,
        start_deci_degrees: i16,
        end_deci_degrees: i16,
    },
}

pub fn mod_deci_degrees(a: i32) -> i32 {
    a.rem_euclid(3600)
}

impl Command {
    /// The packets that make up this command, in the order they must be sent.
    pub fn encode(&self, model: Model) -> Vec<Vec<u8>> {
        let mut packets = Vec::with_capacity(2);
        let mut cmd: Vec<u8> = Vec::with_capacity(12);

        match *self {
            Command::StayOn => cmd.extend_from_slice(&COMMAND_STAY_ON_A),
            Command::RequestReport(request) => cmd.extend_from_slice(&request.bytes()),
            Command::Power { transmit } => {
                packets.push(vec![0x00, 0xc1, 0x01]);
                cmd.extend_from_slice(&[0x01, 0xc1, transmit as u8]);
            }
            Command::Range { decimeters } => {
                cmd.extend_from_slice(&[0x03, 0xc1]);
                cmd.extend_from_slice(&decimeters.to_le_bytes());
            }
            Command::BearingAlignment { deci_degrees } => {
                let value = mod_deci_degrees(deci_degrees as i32) as i16;
                cmd.extend_from_slice(&[0x05, 0xc1]);
                cmd.extend_from_slice(&value.to_le_bytes());
            }
            Command::Gain { auto, value } => {
                cmd.extend_from_slice(&[0x06, 0xc1, 0x00, 0x00, 0x00, 0x00]);
                cmd.extend_from_slice(&(auto as u32).to_le_bytes());
                cmd.push(value);
            }
            Command::SeaClutter(sea) => {
                if model == Model::HALO {
                    // Capture data:
                    // Data: 11c101000004 = Auto
                    // Data: 11c10100ff04 = Auto-1
                    // Data: 11c10100ce04 = Auto-50
                    // Data: 11c100646402 = 100
                    // Data: 11c100000002 = 0
                    // Data: 11c100000001 = Mode manual
                    // Data: 11c101000001 = Mode auto
                    match sea {
                        SeaClutter::Manual(value) => {
                            packets.push(vec![0x11, 0xc1, 0x00, 0x00, 0x00, 0x01]);
                            cmd.extend_from_slice(&[0x11, 0xc1, 0x00, value, value, 0x02]);
                        }
                        SeaClutter::Auto(nudge) => {
                            packets.push(vec![0x11, 0xc1, 0x01, 0x00, 0x00, 0x01]);
                            cmd.extend_from_slice(&[0x11, 0xc1, 0x01, 0x00, nudge as u8, 0x04]);
                        }
                    }
                } else {
                    // The auto flag and value are big endian here, unlike everything else
                    let (auto, value) = match sea {
                        SeaClutter::Manual(value) => (0u32, value as u32),
                        SeaClutter::Auto(_) => (1u32, 0u32),
                    };
                    cmd.extend_from_slice(&[0x06, 0xc1, 0x02]);
                    cmd.extend_from_slice(&auto.to_be_bytes());
                    cmd.extend_from_slice(&value.to_be_bytes());
                }
            }
            Command::Rain { value } => {
                cmd.extend_from_slice(&[0x06, 0xc1, 0x04, 0, 0, 0, 0, 0, 0, 0, value]);
            }
            Command::SideLobeSuppression { auto, value } => {
                cmd.extend_from_slice(&[0x06, 0xc1, 0x05, 0, 0, 0, auto as u8, 0, 0, 0, value]);
            }
            Command::InterferenceRejection(v) => cmd.extend_from_slice(&[0x08, 0xc1, v]),
            Command::TargetExpansion(v) => {
                if model == Model::HALO {
                    cmd.extend_from_slice(&[0x12, 0xc1, v]);
                } else {
                    cmd.extend_from_slice(&[0x09, 0xc1, v]);
                }
            }
            Command::TargetBoost(v) => cmd.extend_from_slice(&[0x0a, 0xc1, v]),
            Command::SeaState(v) => cmd.extend_from_slice(&[0x0b, 0xc1, code_of(v)]),
            Command::LocalInterferenceRejection(v) => cmd.extend_from_slice(&[0x0e, 0xc1, v]),
            Command::ScanSpeed(v) => cmd.extend_from_slice(&[0x0f, 0xc1, v]),
            Command::Mode(v) => cmd.extend_from_slice(&[0x10, 0xc1, code_of(v)]),
            Command::NoiseRejection(v) => cmd.extend_from_slice(&[0x21, 0xc1, v]),
            Command::TargetSeparation(v) => cmd.extend_from_slice(&[0x22, 0xc1, v]),
            Command::Doppler(v) => cmd.extend_from_slice(&[0x23, 0xc1, code_of(v)]),
            Command::DopplerSpeed { cm_per_s } => {
                let value = cm_per_s.min(DOPPLER_SPEED_MAX);
                cmd.extend_from_slice(&[0x24, 0xc1]);
                cmd.extend_from_slice(&value.to_le_bytes());
            }
            Command::AntennaHeight { millimeters } => {
                cmd.extend_from_slice(&[0x30, 0xc1, 0x01, 0, 0, 0]);
                cmd.extend_from_slice(&millimeters.to_le_bytes());
                cmd.extend_from_slice(&[0, 0]);
            }
            Command::AccentLight(v) => cmd.extend_from_slice(&[0x31, 0xc1, v]),
            Command::SectorBlanking {
                sector,
                enabled,
                start_deci_degrees,
                end_deci_degrees,
            } => {
                let start = mod_deci_degrees(start_deci_degrees as i32) as i16;
                let end = mod_deci_degrees(end_deci_degrees as i32) as i16;
                packets.push(vec![0x0d, 0xc1, sector, 0, 0, 0, enabled as u8]);
                cmd.extend_from_slice(&[0xc0, 0xc1, sector, 0, 0, 0, enabled as u8]);
                cmd.extend_from_slice(&start.to_le_bytes());
                cmd.extend_from_slice(&end.to_le_bytes());
            }
        }

        packets.push(cmd);
        packets
    }

    /// Decode the final packet of a command sequence. Returns `None` for preamble
    /// packets and anything that is not a command we send.
    pub fn parse(packet: &[u8]) -> Option<Command> {
        if packet.len() < 2 {
            return None;
        }
        let value = |i: usize| packet.get(i).copied();
        let le16 = |i: usize| -> Option<[u8; 2]> { packet.get(i..i + 2)?.try_into().ok() };

        let command = match (packet[0], packet[1]) {
            (0xa0, 0xc1) => Command::StayOn,
            (0x04, 0xc2) => Command::RequestReport(ReportRequest::Report03),
            (0x01, 0xc2) => Command::RequestReport(ReportRequest::Many),
            (0x02, 0xc2) => Command::RequestReport(ReportRequest::Report04),
            (0x03, 0xc2) => Command::RequestReport(ReportRequest::Report02And08),
            (0x01, 0xc1) => Command::Power {
                transmit: value(2)? == 1,
            },
            (0x03, 0xc1) => Command::Range {
                decimeters: i32::from_le_bytes(packet.get(2..6)?.try_into().ok()?),
            },
            (0x05, 0xc1) => Command::BearingAlignment {
                deci_degrees: i16::from_le_bytes(le16(2)?),
            },
            (0x06, 0xc1) => match (value(2)?, packet.len()) {
                (0x00, 11) => Command::Gain {
                    auto: value(6)? != 0,
                    value: value(10)?,
                },
                (0x02, 11) => {
                    if packet[3..7] == [0, 0, 0, 0] {
                        Command::SeaClutter(SeaClutter::Manual(value(10)?))
                    } else {
                        Command::SeaClutter(SeaClutter::Auto(0))
                    }
                }
                (0x04, 11) => Command::Rain { value: value(10)? },
                (0x05, 11) => Command::SideLobeSuppression {
                    auto: value(6)? != 0,
                    value: value(10)?,
                },
                _ => return None,
            },
            (0x11, 0xc1) => match value(5)? {
                0x02 => Command::SeaClutter(SeaClutter::Manual(value(3)?)),
                0x04 => Command::SeaClutter(SeaClutter::Auto(value(4)? as i8)),
                _ => return None,
            },
            (0x08, 0xc1) => Command::InterferenceRejection(value(2)?),
            (0x09, 0xc1) | (0x12, 0xc1) => Command::TargetExpansion(value(2)?),
            (0x0a, 0xc1) => Command::TargetBoost(value(2)?),
            (0x0b, 0xc1) => Command::SeaState(SeaState::from_u8(value(2)?)?),
            (0x0e, 0xc1) => Command::LocalInterferenceRejection(value(2)?),
            (0x0f, 0xc1) => Command::ScanSpeed(value(2)?),
            (0x10, 0xc1) => Command::Mode(HaloMode::from_u8(value(2)?)?),
            (0x21, 0xc1) => Command::NoiseRejection(value(2)?),
            (0x22, 0xc1) => Command::TargetSeparation(value(2)?),
            (0x23, 0xc1) => Command::Doppler(DopplerMode::from_u8(value(2)?)?),
            (0x24, 0xc1) => Command::DopplerSpeed {
                cm_per_s: u16::from_le_bytes(le16(2)?),
            },
            (0x30, 0xc1) => Command::AntennaHeight {
                millimeters: u16::from_le_bytes(le16(6)?),
            },
            (0x31, 0xc1) => Command::AccentLight(value(2)?),
            (0xc0, 0xc1) => Command::SectorBlanking {
                sector: value(2)?,
                enabled: value(6)? != 0,
                start_deci_degrees: i16::from_le_bytes(le16(7)?),
                end_deci_degrees: i16::from_le_bytes(le16(9)?),
            },
            _ => return None,
        };
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(command: Command, model: Model) -> Vec<u8> {
        let packets = command.encode(model);
        assert_eq!(packets.len(), 1, "{:?}", command);
        packets.into_iter().next().unwrap()
    }

    #[test]
    fn report_requests() {
        assert_eq!(single(Command::StayOn, Model::HALO), vec![0xa0, 0xc1]);
        assert_eq!(
            single(Command::RequestReport(ReportRequest::Many), Model::HALO),
            vec![0x01, 0xc2]
        );
        assert_eq!(
            single(Command::RequestReport(ReportRequest::Report03), Model::HALO),
            vec![0x04, 0xc2]
        );
    }

    #[test]
    fn power_is_two_packets() {
        assert_eq!(
            Command::Power { transmit: true }.encode(Model::Gen4),
            vec![vec![0x00, 0xc1, 0x01], vec![0x01, 0xc1, 0x01]]
        );
        assert_eq!(
            Command::Power { transmit: false }.encode(Model::Gen4),
            vec![vec![0x00, 0xc1, 0x01], vec![0x01, 0xc1, 0x00]]
        );
    }

    #[test]
    fn range_and_bearing_layout() {
        assert_eq!(
            single(Command::Range { decimeters: 18520 }, Model::HALO),
            vec![0x03, 0xc1, 0x58, 0x48, 0x00, 0x00]
        );
        // -1.5 degrees wraps to 358.5
        assert_eq!(
            single(Command::BearingAlignment { deci_degrees: -15 }, Model::HALO),
            vec![0x05, 0xc1, 0x01, 0x0e]
        );
    }

    #[test]
    fn gain_auto_flag_precedes_value() {
        assert_eq!(
            single(
                Command::Gain {
                    auto: true,
                    value: 0x80
                },
                Model::Gen4
            ),
            vec![0x06, 0xc1, 0, 0, 0, 0, 1, 0, 0, 0, 0x80]
        );
        assert_eq!(
            single(
                Command::SideLobeSuppression {
                    auto: true,
                    value: 0x40
                },
                Model::Gen4
            ),
            vec![0x06, 0xc1, 0x05, 0, 0, 0, 1, 0, 0, 0, 0x40]
        );
    }

    #[test]
    fn sea_clutter_depends_on_model() {
        assert_eq!(
            single(Command::SeaClutter(SeaClutter::Manual(0x64)), Model::Gen4),
            vec![0x06, 0xc1, 0x02, 0, 0, 0, 0, 0, 0, 0, 0x64]
        );
        assert_eq!(
            single(Command::SeaClutter(SeaClutter::Auto(0)), Model::Gen4),
            vec![0x06, 0xc1, 0x02, 0, 0, 0, 1, 0, 0, 0, 0]
        );
        assert_eq!(
            Command::SeaClutter(SeaClutter::Manual(100)).encode(Model::HALO),
            vec![
                vec![0x11, 0xc1, 0x00, 0x00, 0x00, 0x01],
                vec![0x11, 0xc1, 0x00, 0x64, 0x64, 0x02]
            ]
        );
        assert_eq!(
            Command::SeaClutter(SeaClutter::Auto(-50)).encode(Model::HALO),
            vec![
                vec![0x11, 0xc1, 0x01, 0x00, 0x00, 0x01],
                vec![0x11, 0xc1, 0x01, 0x00, 0xce, 0x04]
            ]
        );
    }

    #[test]
    fn target_expansion_register() {
        assert_eq!(
            single(Command::TargetExpansion(1), Model::HALO),
            vec![0x12, 0xc1, 1]
        );
        assert_eq!(
            single(Command::TargetExpansion(1), Model::Gen3),
            vec![0x09, 0xc1, 1]
        );
    }

    #[test]
    fn sector_blanking_sequence() {
        let packets = Command::SectorBlanking {
            sector: 2,
            enabled: true,
            start_deci_degrees: -100,
            end_deci_degrees: 450,
        }
        .encode(Model::HALO);
        assert_eq!(packets[0], vec![0x0d, 0xc1, 2, 0, 0, 0, 1]);
        assert_eq!(
            packets[1],
            vec![0xc0, 0xc1, 2, 0, 0, 0, 1, 0xac, 0x0d, 0xc2, 0x01]
        );
    }

    #[test]
    fn doppler_speed_is_clamped() {
        assert_eq!(
            single(Command::DopplerSpeed { cm_per_s: 5000 }, Model::HALO),
            vec![0x24, 0xc1, 0x3a, 0x06]
        );
    }

    #[test]
    fn round_trip_through_parse() {
        let commands = [
            Command::StayOn,
            Command::RequestReport(ReportRequest::Report02And08),
            Command::Power { transmit: true },
            Command::Range { decimeters: 7408 },
            Command::BearingAlignment { deci_degrees: 3599 },
            Command::Gain {
                auto: false,
                value: 200,
            },
            Command::SeaClutter(SeaClutter::Manual(33)),
            Command::SeaClutter(SeaClutter::Auto(-7)),
            Command::Rain { value: 12 },
            Command::SideLobeSuppression {
                auto: true,
                value: 0,
            },
            Command::InterferenceRejection(2),
            Command::TargetExpansion(3),
            Command::TargetBoost(1),
            Command::SeaState(SeaState::Rough),
            Command::LocalInterferenceRejection(3),
            Command::ScanSpeed(1),
            Command::Mode(HaloMode::Bird),
            Command::NoiseRejection(2),
            Command::TargetSeparation(1),
            Command::Doppler(DopplerMode::Approaching),
            Command::DopplerSpeed { cm_per_s: 1594 },
            Command::AntennaHeight { millimeters: 4500 },
            Command::AccentLight(3),
            Command::SectorBlanking {
                sector: 3,
                enabled: false,
                start_deci_degrees: 100,
                end_deci_degrees: 3500,
            },
        ];

        for command in commands {
            let packets = command.encode(Model::HALO);
            let last = packets.last().unwrap();
            assert_eq!(Command::parse(last), Some(command), "{:02X?}", last);
        }

        // Non HALO sea clutter in manual mode
        let packets = Command::SeaClutter(SeaClutter::Manual(77)).encode(Model::Gen4);
        assert_eq!(
            Command::parse(&packets[0]),
            Some(Command::SeaClutter(SeaClutter::Manual(77)))
        );
    }

    #[test]
    fn preamble_is_not_a_command() {
        assert_eq!(Command::parse(&[0x00, 0xc1, 0x01]), None);
        assert_eq!(Command::parse(&[0x0d, 0xc1, 2, 0, 0, 0, 1]), None);
        assert_eq!(Command::parse(&[0x11, 0xc1, 0x00, 0x00, 0x00, 0x01]), None);
        assert_eq!(Command::parse(&[0x10, 0xc1, 0x42]), None);
    }
}
