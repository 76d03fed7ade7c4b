//
// The locator finds the radar by sending an address request on the Navico
// beacon group and listening for the beacon that comes back. The BR24 sends
// its beacon to a different group, so both groups are listened to.
//

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::sleep;

use crate::navico::{
    Beacon, NAVICO_ADDRESS_REQUEST_PACKET, NAVICO_BEACON_ADDRESS, NAVICO_BR24_BEACON_ADDRESS,
    parse_beacon,
};
use crate::network::{create_multicast_send, create_udp_multicast_listen};
use crate::radar::RadarError;

/// The three multicast endpoints of one radar channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSet {
    pub data: SocketAddrV4,
    pub report: SocketAddrV4,
    pub send: SocketAddrV4,
}

/// Everything needed to connect to one radar channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MulticastInterfaces {
    pub data: SocketAddrV4,
    pub report: SocketAddrV4,
    pub send: SocketAddrV4,
    pub nic_addr: Ipv4Addr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Channel {
    #[default]
    A,
    B,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Channel::A => write!(f, "A"),
            Channel::B => write!(f, "B"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub serial_no: String,
    pub radar_addr: SocketAddrV4,
    pub nic_addr: Ipv4Addr,
    pub a: AddressSet,
    pub b: Option<AddressSet>,
}

impl Located {
    fn new(beacon: Beacon, nic_addr: Ipv4Addr) -> Self {
        Located {
            serial_no: beacon.serial_no,
            radar_addr: beacon.radar_addr,
            nic_addr,
            a: beacon.a,
            b: beacon.b,
        }
    }

    /// The endpoints of a channel. Single radars only have channel A.
    pub fn interfaces(&self, channel: Channel) -> Option<MulticastInterfaces> {
        let set = match channel {
            Channel::A => Some(self.a),
            Channel::B => self.b,
        }?;
        Some(MulticastInterfaces {
            data: set.data,
            report: set.report,
            send: set.send,
            nic_addr: self.nic_addr,
        })
    }

    pub fn key(&self, channel: Channel) -> String {
        match self.b {
            Some(_) => format!("{}-{}", self.serial_no, channel),
            None => self.serial_no.clone(),
        }
    }
}

/// Probe for a radar via `nic_addr` every `retry_interval` until a beacon is
/// received or `timeout` elapses.
pub async fn discover(
    nic_addr: Ipv4Addr,
    timeout: Duration,
    retry_interval: Duration,
) -> Result<Located, RadarError> {
    log::info!(
        "Locating radar via {} (timeout {:?}, retry every {:?})",
        nic_addr,
        timeout,
        retry_interval
    );

    match tokio::time::timeout(timeout, locate(nic_addr, retry_interval)).await {
        Ok(located) => {
            log::info!(
                "Located radar {} at {} with channel A {:?}, channel B {:?}",
                located.serial_no,
                located.radar_addr,
                located.a,
                located.b
            );
            Ok(located)
        }
        Err(_) => {
            log::warn!("No radar located via {} within {:?}", nic_addr, timeout);
            Err(RadarError::LocateTimeout(timeout))
        }
    }
}

async fn locate(nic_addr: Ipv4Addr, retry_interval: Duration) -> Located {
    loop {
        let sockets = create_udp_multicast_listen(&NAVICO_BEACON_ADDRESS, &nic_addr).and_then(
            |beacon| {
                create_udp_multicast_listen(&NAVICO_BR24_BEACON_ADDRESS, &nic_addr)
                    .map(|br24| (beacon, br24))
            },
        );
        let (beacon_socket, br24_socket) = match sockets {
            Ok(sockets) => sockets,
            Err(e) => {
                log::warn!("Cannot listen for beacons on {}: {}", nic_addr, e);
                sleep(retry_interval).await;
                continue;
            }
        };
        log::debug!(
            "Listening on {} for beacons on {} and {}",
            nic_addr,
            NAVICO_BEACON_ADDRESS,
            NAVICO_BR24_BEACON_ADDRESS
        );

        // The probe loop never completes; it is dropped once a beacon arrives.
        tokio::select! {
            located = receive_beacons(&beacon_socket, &br24_socket, nic_addr, retry_interval) => {
                return located;
            }
            _ = send_probes(nic_addr, retry_interval) => {}
        }
    }
}

async fn send_probes(nic_addr: Ipv4Addr, retry_interval: Duration) {
    loop {
        match create_multicast_send(&NAVICO_BEACON_ADDRESS, &nic_addr) {
            Ok(socket) => match socket.send(&NAVICO_ADDRESS_REQUEST_PACKET).await {
                Ok(_) => {
                    log::trace!(
                        "{} via {} <- {:02X?}",
                        NAVICO_BEACON_ADDRESS,
                        nic_addr,
                        NAVICO_ADDRESS_REQUEST_PACKET
                    );
                }
                Err(e) => {
                    log::debug!("Cannot send address request via {}: {}", nic_addr, e);
                }
            },
            Err(e) => {
                log::debug!("Cannot create probe socket on {}: {}", nic_addr, e);
            }
        }
        sleep(retry_interval).await;
    }
}

async fn receive_beacons(
    beacon_socket: &UdpSocket,
    br24_socket: &UdpSocket,
    nic_addr: Ipv4Addr,
    retry_interval: Duration,
) -> Located {
    let mut beacon_buf = [0u8; 2048];
    let mut br24_buf = [0u8; 2048];

    loop {
        let r = tokio::select! {
            r = beacon_socket.recv_from(&mut beacon_buf) => r.map(|(len, from)| (len, from, false)),
            r = br24_socket.recv_from(&mut br24_buf) => r.map(|(len, from)| (len, from, true)),
        };

        match r {
            Ok((len, from, br24)) => {
                let data = if br24 {
                    &br24_buf[..len]
                } else {
                    &beacon_buf[..len]
                };
                log::trace!("{} via {} -> {:02X?}", from, nic_addr, data);
                match parse_beacon(data, br24) {
                    Ok(Some(beacon)) => return Located::new(beacon, nic_addr),
                    Ok(None) => {
                        log::trace!("Ignoring non-beacon packet from {}", from);
                    }
                    Err(e) => {
                        log::warn!("Incomprehensible beacon from {}: {}", from, e);
                    }
                }
            }
            Err(e) => {
                log::debug!("Beacon receive error on {}: {}", nic_addr, e);
                sleep(retry_interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navico::tests::{addr, br24_beacon, dual_beacon};
    use std::time::Instant;

    async fn loopback() -> (UdpSocket, SocketAddrV4) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = match socket.local_addr().unwrap() {
            std::net::SocketAddr::V4(a) => a,
            std::net::SocketAddr::V6(_) => unreachable!(),
        };
        (socket, addr)
    }

    fn located(b: Option<AddressSet>) -> Located {
        Located {
            serial_no: "1403503101".to_string(),
            radar_addr: addr("10.56.0.161:1"),
            nic_addr: Ipv4Addr::new(10, 56, 0, 1),
            a: AddressSet {
                data: addr("236.6.7.8:6678"),
                report: addr("236.6.7.9:6679"),
                send: addr("236.6.7.10:6680"),
            },
            b,
        }
    }

    #[test]
    fn interfaces_per_channel() {
        let b = AddressSet {
            data: addr("236.6.7.13:6657"),
            report: addr("236.6.7.15:6659"),
            send: addr("236.6.7.14:6658"),
        };
        let dual = located(Some(b));

        let a = dual.interfaces(Channel::A).unwrap();
        assert_eq!(a.data, addr("236.6.7.8:6678"));
        assert_eq!(a.nic_addr, Ipv4Addr::new(10, 56, 0, 1));
        assert_eq!(dual.interfaces(Channel::B).unwrap().send, b.send);
        assert_eq!(dual.key(Channel::B), "1403503101-B");
    }

    #[test]
    fn single_radar_has_no_channel_b() {
        let single = located(None);
        assert!(single.interfaces(Channel::B).is_none());
        assert_eq!(single.key(Channel::A), "1403503101");
    }

    #[tokio::test]
    async fn discover_times_out_without_radar() {
        let timeout = Duration::from_millis(300);
        let start = Instant::now();

        let r = discover(Ipv4Addr::LOCALHOST, timeout, Duration::from_millis(50)).await;

        let elapsed = start.elapsed();
        assert!(matches!(r, Err(RadarError::LocateTimeout(t)) if t == timeout));
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_secs(2));
    }

    #[tokio::test]
    async fn beacon_after_own_address_request() {
        let (beacon_socket, beacon_addr) = loopback().await;
        let (br24_socket, _) = loopback().await;
        let (sender, _) = loopback().await;
        let nic_addr = Ipv4Addr::LOCALHOST;

        sender
            .send_to(&NAVICO_ADDRESS_REQUEST_PACKET, beacon_addr)
            .await
            .unwrap();
        sender.send_to(&dual_beacon(), beacon_addr).await.unwrap();

        let located = tokio::time::timeout(
            Duration::from_secs(2),
            receive_beacons(&beacon_socket, &br24_socket, nic_addr, Duration::from_millis(50)),
        )
        .await
        .unwrap();

        assert_eq!(located.serial_no, "1403301583");
        assert_eq!(located.radar_addr, addr("10.0.67.217:257"));
        assert_eq!(located.nic_addr, nic_addr);
        assert_eq!(located.a.report, addr("236.6.7.9:6679"));
        assert_eq!(located.a.send, addr("236.6.7.10:6680"));
        let b = located.interfaces(Channel::B).unwrap();
        assert_eq!(b.data, addr("236.6.7.13:6657"));
        assert_eq!(b.nic_addr, nic_addr);
        assert_eq!(located.key(Channel::B), "1403301583-B");
    }

    #[tokio::test]
    async fn br24_beacon_on_its_own_group() {
        let (beacon_socket, _) = loopback().await;
        let (br24_socket, br24_addr) = loopback().await;
        let (sender, _) = loopback().await;

        sender.send_to(&br24_beacon(), br24_addr).await.unwrap();

        let located = tokio::time::timeout(
            Duration::from_secs(2),
            receive_beacons(
                &beacon_socket,
                &br24_socket,
                Ipv4Addr::LOCALHOST,
                Duration::from_millis(50),
            ),
        )
        .await
        .unwrap();

        // The BR24 layout lists report, send and data in a different order
        assert_eq!(located.a.report, addr("236.6.7.9:6679"));
        assert_eq!(located.a.send, addr("236.6.7.10:6680"));
        assert_eq!(located.a.data, addr("236.6.7.8:6678"));
        assert!(located.b.is_none());
    }
}
