use network_interface::{NetworkInterface, NetworkInterfaceConfig};
use serde::Deserialize;
use socket2::{Domain, Protocol, Type};
use std::fmt;
use std::net::SocketAddrV4;
use std::{
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
};
use tokio::net::UdpSocket;

use crate::radar::RadarError;

// This is like a SocketAddrV4 but with known layout
#[derive(Deserialize, Copy, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct NetworkSocketAddrV4 {
    addr: [u8; 4],
    port: [u8; 2],
}

impl NetworkSocketAddrV4 {
    pub fn to_bytes(addr: &SocketAddrV4) -> [u8; 6] {
        let mut bytes = [0u8; 6];
        bytes[0..4].copy_from_slice(&addr.ip().octets());
        bytes[4..6].copy_from_slice(&addr.port().to_be_bytes());
        bytes
    }
}

impl From<NetworkSocketAddrV4> for SocketAddrV4 {
    fn from(item: NetworkSocketAddrV4) -> Self {
        SocketAddrV4::new(
            u32::from_be_bytes(item.addr).into(),
            u16::from_be_bytes(item.port),
        )
    }
}

impl std::fmt::Display for NetworkSocketAddrV4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}",
            Ipv4Addr::from(u32::from_be_bytes(self.addr)),
            u16::from_be_bytes(self.port)
        )
    }
}

impl fmt::Debug for NetworkSocketAddrV4 {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("NetworkSocketAddrV4")
            .field("addr", &self.addr)
            .field("port", &format_args!("{}", u16::from_be_bytes(self.port)))
            .finish()
    }
}

// this will be common for all our sockets
pub fn new_socket() -> io::Result<socket2::Socket> {
    let socket = socket2::Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    // we're going to use read timeouts so that we don't hang waiting for packets
    socket.set_nonblocking(true)?;
    socket.set_reuse_address(true)?;

    Ok(socket)
}

/// On Windows, unlike all Unix variants, it is improper to bind to the multicast address
///
/// see https://msdn.microsoft.com/en-us/library/windows/desktop/ms737550(v=vs.85).aspx
#[cfg(windows)]
fn bind_to_multicast(
    socket: &socket2::Socket,
    addr: &SocketAddrV4,
    nic_addr: &Ipv4Addr,
) -> io::Result<()> {
    socket.join_multicast_v4(addr.ip(), nic_addr)?;

    let socketaddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), addr.port());
    socket.bind(&socket2::SockAddr::from(socketaddr))?;
    log::trace!("Binding multicast socket to {}", socketaddr);

    Ok(())
}

/// On unixes we bind to the multicast address, which causes multicast packets to be filtered
#[cfg(unix)]
fn bind_to_multicast(
    socket: &socket2::Socket,
    addr: &SocketAddrV4,
    nic_addr: &Ipv4Addr,
) -> io::Result<()> {
    // Linux is special, if we don't disable IP_MULTICAST_ALL the kernel forgets on
    // which device the multicast packet arrived and sends it to all sockets.
    #[cfg(target_os = "linux")]
    {
        use std::{mem, os::unix::io::AsRawFd};

        unsafe {
            let optval: libc::c_int = 0;
            let ret = libc::setsockopt(
                socket.as_raw_fd(),
                libc::SOL_IP,
                libc::IP_MULTICAST_ALL,
                &optval as *const _ as *const libc::c_void,
                mem::size_of_val(&optval) as libc::socklen_t,
            );
            if ret != 0 {
                return Err(io::Error::last_os_error());
            }
        }
    }

    let socketaddr = SocketAddr::new(IpAddr::V4(*addr.ip()), addr.port());
    socket.bind(&socket2::SockAddr::from(socketaddr))?;

    socket.join_multicast_v4(addr.ip(), nic_addr)?;

    log::trace!(
        "Binding multicast socket to {} nic {}",
        socketaddr,
        nic_addr
    );

    Ok(())
}

pub fn create_udp_multicast_listen(
    addr: &SocketAddrV4,
    nic_addr: &Ipv4Addr,
) -> io::Result<UdpSocket> {
    let socket: socket2::Socket = new_socket()?;

    bind_to_multicast(&socket, addr, nic_addr)?;

    let socket = UdpSocket::from_std(socket.into())?;
    Ok(socket)
}

/// Socket that sends to a single multicast group out of the given interface.
pub fn create_multicast_send(addr: &SocketAddrV4, nic_addr: &Ipv4Addr) -> io::Result<UdpSocket> {
    let socket: socket2::Socket = new_socket()?;

    socket.set_multicast_if_v4(nic_addr)?;
    let socketaddr = SocketAddr::new(IpAddr::V4(*addr.ip()), addr.port());
    let socketaddr_nic = SocketAddr::new(IpAddr::V4(*nic_addr), 0);
    socket.bind(&socket2::SockAddr::from(socketaddr_nic))?;
    socket.connect(&socket2::SockAddr::from(socketaddr))?;

    let socket = UdpSocket::from_std(socket.into())?;
    Ok(socket)
}

/// Resolve the IPv4 address of a named interface, or the first
/// non-loopback IPv4 address when no name is given.
pub fn find_interface_addr(interface: Option<&str>) -> Result<Ipv4Addr, RadarError> {
    let interfaces = NetworkInterface::show().map_err(|e| {
        log::error!("Unable to list Ethernet interfaces on this platform: {}", e);
        RadarError::EnumerationFailed
    })?;

    let addresses: Vec<(String, IpAddr)> = interfaces
        .into_iter()
        .flat_map(|itf| {
            let name = itf.name;
            itf.addr.into_iter().map(move |a| (name.clone(), a.ip()))
        })
        .collect();
    select_interface_addr(&addresses, interface)
}

fn select_interface_addr(
    addresses: &[(String, IpAddr)],
    interface: Option<&str>,
) -> Result<Ipv4Addr, RadarError> {
    match interface {
        Some(name) => {
            let mut seen = false;
            for (itf, ip) in addresses.iter().filter(|(itf, _)| itf == name) {
                seen = true;
                if let IpAddr::V4(ip) = ip {
                    log::debug!("Interface '{}' has address {}", itf, ip);
                    return Ok(*ip);
                }
            }
            if seen {
                Err(RadarError::InterfaceNoV4(name.to_string()))
            } else {
                Err(RadarError::InterfaceNotFound(name.to_string()))
            }
        }
        None => addresses
            .iter()
            .find_map(|(_, ip)| match ip {
                IpAddr::V4(ip) if !ip.is_loopback() => Some(*ip),
                _ => None,
            })
            .ok_or_else(|| RadarError::InterfaceNoV4("any".to_string())),
    }
}
