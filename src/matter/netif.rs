//! The single network interface the bridge is served on.
//!
//! rs-matter's `UnixNetifs` reports every interface of the host, including
//! addresses reflected from other networks. The bridge binds to one
//! interface instead, configured or picked at startup, and reports only that
//! one in General Diagnostics and mDNS.

use std::ffi::CString;
use std::net::{Ipv4Addr, Ipv6Addr};

use log::{debug, error, info, warn};
use nix::ifaddrs::{InterfaceAddress, getifaddrs};
use nix::net::if_::{InterfaceFlags, if_nametoindex};
use nix::sys::socket::{AddressFamily, SockaddrLike};

use rs_matter::dm::clusters::gen_diag::{InterfaceTypeEnum, NetifDiag, NetifInfo};
use rs_matter::dm::networks::NetChangeNotif;
use rs_matter::error::{Error, ErrorCode};

/// Addresses of one interface. Link-local IPv6 addresses are left out.
#[derive(Debug, Default, Clone)]
pub struct NetifAddrs {
    pub ipv4: Vec<Ipv4Addr>,
    pub ipv6: Vec<Ipv6Addr>,
    pub hw_addr: [u8; 8],
    pub operational: bool,
}

/// Reports one named interface to the data model.
#[derive(Clone, Copy)]
pub struct BridgeNetif {
    name: &'static str,
}

impl BridgeNetif {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    /// Use `configured` when given, otherwise the first interface that is up,
    /// not a loopback and has an IPv4 address.
    pub fn select(configured: Option<&str>) -> Result<Self, Error> {
        let name = match configured {
            Some(name) => name.to_string(),
            None => detect_interface()?,
        };
        info!("[Matter] Using network interface '{}'", name);
        Ok(Self::new(Box::leak(name.into_boxed_str())))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn index(&self) -> Result<u32, Error> {
        let cname = CString::new(self.name).map_err(|_| {
            error!("Invalid interface name: {}", self.name);
            Error::from(ErrorCode::NoNetworkInterface)
        })?;
        if_nametoindex(cname.as_c_str()).map_err(|e| {
            error!("Failed to get interface index for '{}': {:?}", self.name, e);
            Error::from(ErrorCode::NoNetworkInterface)
        })
    }

    pub fn addresses(&self) -> Result<NetifAddrs, Error> {
        let addrs = getifaddrs().map_err(|e| {
            error!("Failed to get interface addresses: {:?}", e);
            Error::from(ErrorCode::NoNetworkInterface)
        })?;

        let mut found = false;
        let mut result = NetifAddrs::default();
        for ifaddr in addrs.filter(|ifaddr| ifaddr.interface_name == self.name) {
            found = true;
            collect_address(&ifaddr, &mut result);
        }

        if !found {
            warn!("[Matter] Interface '{}' not found", self.name);
            return Err(ErrorCode::NoNetworkInterface.into());
        }
        Ok(result)
    }
}

impl NetifDiag for BridgeNetif {
    fn netifs(&self, f: &mut dyn FnMut(&NetifInfo) -> Result<(), Error>) -> Result<(), Error> {
        // A vanished interface is reported as no interface at all
        let Ok(addrs) = self.addresses() else {
            return Ok(());
        };
        let netif_index = self.index().unwrap_or(0);

        debug!(
            "[Matter] Reporting '{}' with {} IPv4 and {} IPv6 addresses",
            self.name,
            addrs.ipv4.len(),
            addrs.ipv6.len()
        );

        f(&NetifInfo {
            name: self.name,
            operational: addrs.operational,
            offprem_svc_reachable_ipv4: None,
            offprem_svc_reachable_ipv6: None,
            hw_addr: &addrs.hw_addr,
            ipv4_addrs: &addrs.ipv4,
            ipv6_addrs: &addrs.ipv6,
            netif_type: InterfaceTypeEnum::Ethernet,
            netif_index,
        })
    }
}

impl NetChangeNotif for BridgeNetif {
    async fn wait_changed(&self) {
        core::future::pending().await
    }
}

fn collect_address(ifaddr: &InterfaceAddress, into: &mut NetifAddrs) {
    if ifaddr.flags.contains(InterfaceFlags::IFF_RUNNING) {
        into.operational = true;
    }

    let Some(addr) = ifaddr.address else {
        return;
    };
    match addr.family() {
        Some(AddressFamily::Inet) => {
            if let Some(sockaddr) = addr.as_sockaddr_in() {
                into.ipv4.push(sockaddr.ip());
            }
        }
        Some(AddressFamily::Inet6) => {
            if let Some(sockaddr) = addr.as_sockaddr_in6() {
                let ip = sockaddr.ip();
                if !is_link_local(&ip) {
                    into.ipv6.push(ip);
                }
            }
        }
        Some(AddressFamily::Packet) => {
            if let Some(mac) = addr.as_link_addr().and_then(|link| link.addr()) {
                let len = mac.len().min(into.hw_addr.len());
                into.hw_addr[..len].copy_from_slice(&mac[..len]);
            }
        }
        _ => {}
    }
}

fn detect_interface() -> Result<String, Error> {
    let addrs = getifaddrs().map_err(|e| {
        error!("Failed to get interface addresses: {:?}", e);
        Error::from(ErrorCode::NoNetworkInterface)
    })?;

    for ifaddr in addrs {
        let flags = ifaddr.flags;
        if !flags.contains(InterfaceFlags::IFF_UP) || flags.contains(InterfaceFlags::IFF_LOOPBACK) {
            continue;
        }
        let has_ipv4 = ifaddr
            .address
            .is_some_and(|addr| addr.family() == Some(AddressFamily::Inet));
        if has_ipv4 {
            return Ok(ifaddr.interface_name);
        }
    }

    error!("No usable network interface found; set MATTER_INTERFACE");
    Err(ErrorCode::NoNetworkInterface.into())
}

/// fe80::/10
fn is_link_local(ip: &Ipv6Addr) -> bool {
    let octets = ip.octets();
    octets[0] == 0xfe && (octets[1] & 0xc0) == 0x80
}
