use super::device_info::{basic_info, comm_data};
use super::handler::DevicesHandler;
use super::netif::BridgeNetif;
use super::node::build_node;
use super::notifier::ChangeChannel;
use crate::config::MatterConfig;
use crate::device::DeviceRegistry;
use embassy_futures::select::{select, select4};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use log::{debug, error, info};
use rs_matter::dm::IMBuffer;
use rs_matter::dm::clusters::basic_info::BasicInfoConfig;
use rs_matter::dm::devices::test::TEST_DEV_ATT;
use rs_matter::dm::endpoints;
use rs_matter::dm::subscriptions::DefaultSubscriptions;
use rs_matter::dm::{AsyncHandler, AsyncMetadata, DataModel, EmptyHandler, EpClMatcher};
use rs_matter::error::{Error, ErrorCode};
use rs_matter::pairing::DiscoveryCapabilities;
use rs_matter::pairing::qr::QrTextType;
use rs_matter::persist::{NO_NETWORKS, Psm};
use rs_matter::respond::DefaultResponder;
use rs_matter::transport::network::mdns::builtin::{BuiltinMdnsResponder, Host};
use rs_matter::transport::network::mdns::{
    MDNS_IPV4_BROADCAST_ADDR, MDNS_IPV6_BROADCAST_ADDR, MDNS_SOCKET_DEFAULT_BIND_ADDR,
};
use rs_matter::utils::init::InitMaybeUninit;
use rs_matter::utils::select::Coalesce;
use rs_matter::utils::storage::pooled::PooledBuffers;
use rs_matter::{MATTER_PORT, Matter};
use socket2::{Domain, Protocol, Socket, Type};
use static_cell::StaticCell;
use std::fs;
use std::net::{IpAddr, Ipv6Addr, SocketAddr, UdpSocket};
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::{Arc, OnceLock};

/// Static cells for Matter resources (required for 'static lifetime)
static MATTER: StaticCell<Matter> = StaticCell::new();
static BUFFERS: StaticCell<PooledBuffers<10, NoopRawMutex, IMBuffer>> = StaticCell::new();
static SUBSCRIPTIONS: StaticCell<DefaultSubscriptions> = StaticCell::new();
static PSM: StaticCell<Psm<4096>> = StaticCell::new();
static DEV_INFO: StaticCell<BasicInfoConfig<'static>> = StaticCell::new();

/// Attribute changes made outside the Matter thread
static CHANGES: ChangeChannel = ChangeChannel::new();

/// Static hostname storage for mDNS (needs 'static lifetime for Host struct)
static HOSTNAME: OnceLock<String> = OnceLock::new();

const PERSIST_DIR: &str = ".config/matter-accessory-bridge";
const PERSIST_FILE: &str = "matter.bin";

const COMM_WINDOW_TIMEOUT_SECS: u16 = 900;

fn get_persist_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(PERSIST_DIR)
        .join(PERSIST_FILE)
}

/// Root endpoint system clusters, then every device endpoint through one dispatcher.
fn dm_handler<'a, 'd: 'a>(
    matter: &'a Matter<'a>,
    registry: &DeviceRegistry,
    netif: &'a BridgeNetif,
    devices: &'a DevicesHandler<'d>,
) -> impl AsyncMetadata + AsyncHandler + 'a {
    (
        build_node(registry),
        endpoints::with_eth(
            &(),
            netif,
            matter.rand(),
            endpoints::with_sys(
                &false,
                matter.rand(),
                EmptyHandler.chain(EpClMatcher::new(None, None), devices),
            ),
        ),
    )
}

fn io_error(what: &str, e: std::io::Error) -> Error {
    error!("Failed to {}: {}", what, e);
    ErrorCode::StdIoError.into()
}

/// Dual-stack UDP socket bound to `addr`.
fn bind_udp(addr: SocketAddr) -> Result<UdpSocket, Error> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| io_error("create UDP socket", e))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| io_error("set SO_REUSEADDR", e))?;
    socket
        .set_only_v6(false)
        .map_err(|e| io_error("set IPV6_V6ONLY=false", e))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| io_error("set non-blocking", e))?;
    socket
        .bind(&addr.into())
        .map_err(|e| io_error(&format!("bind UDP socket to {:?}", addr), e))?;
    Ok(socket.into())
}

/// Forward attribute changes from the accessory side to the subscriptions.
async fn pump_changes(subscriptions: &DefaultSubscriptions) -> Result<(), Error> {
    loop {
        let changed = CHANGES.receive().await;
        debug!(
            "[Matter] changed {}/0x{:04X}/0x{:04X}",
            changed.endpoint_id, changed.cluster_id, changed.attr_id
        );
        subscriptions.notify_attribute_changed(
            changed.endpoint_id,
            changed.cluster_id,
            changed.attr_id,
        );
    }
}

fn open_commissioning_window(
    matter: &Matter<'_>,
    config: &MatterConfig,
    persist_path: &Path,
) -> Result<(), Error> {
    if matter.is_commissioned() {
        info!("Bridge already commissioned, skipping commissioning window");
        info!("  (Delete {:?} to reset commissioning)", persist_path);
        return Ok(());
    }

    info!(
        "Opening commissioning window for {} seconds...",
        COMM_WINDOW_TIMEOUT_SECS
    );
    matter.open_basic_comm_window(COMM_WINDOW_TIMEOUT_SECS)?;

    info!("Bridge ready for commissioning");
    info!("  Discriminator: {}", config.discriminator);
    info!("  Passcode: {}", config.passcode);

    if let Err(e) = matter.print_standard_qr_text(DiscoveryCapabilities::IP) {
        error!("Failed to print QR text: {:?}", e);
    }
    if let Err(e) = matter.print_standard_qr_code(QrTextType::Unicode, DiscoveryCapabilities::IP)
    {
        error!("Failed to print QR code: {:?}", e);
    }

    Ok(())
}

/// Run the Matter stack serving every device of `registry`.
///
/// Runs until the transport fails. Commissioning state is persisted under
/// the home directory, so a restarted bridge keeps its fabrics.
pub async fn run_matter_stack(
    config: &MatterConfig,
    registry: Arc<DeviceRegistry>,
) -> Result<(), Error> {
    info!("Initializing Matter stack...");

    let dev_info = DEV_INFO.init(basic_info(config));
    let matter = MATTER.uninit().init_with(Matter::init(
        dev_info,
        comm_data(config),
        &TEST_DEV_ATT,
        rs_matter::utils::epoch::sys_epoch,
        rs_matter::utils::rand::sys_rand,
        MATTER_PORT,
    ));

    matter.initialize_transport_buffers()?;

    // Addresses are resolved before binding: responses must leave from the
    // IPv6 address advertised over mDNS
    let netif = BridgeNetif::select(config.interface.as_deref())?;
    let interface_index = netif.index()?;
    let addrs = netif.addresses()?;

    let Some(ipv4_addr) = addrs.ipv4.first().copied() else {
        error!("No IPv4 address found on interface '{}'", netif.name());
        return Err(ErrorCode::NoNetworkInterface.into());
    };
    let ipv6_addr = addrs.ipv6.first().copied().unwrap_or_else(|| {
        info!(
            "No global IPv6 address on '{}', using unspecified",
            netif.name()
        );
        Ipv6Addr::UNSPECIFIED
    });

    info!(
        "Using interface '{}' (index {}) with {} and {}",
        netif.name(),
        interface_index,
        ipv4_addr,
        ipv6_addr
    );

    let bind_addr = SocketAddr::new(IpAddr::V6(ipv6_addr), MATTER_PORT);
    let socket = async_io::Async::<UdpSocket>::new(bind_udp(bind_addr)?)
        .map_err(|e| io_error("create async socket", e))?;
    info!("Matter UDP socket bound to {:?}", bind_addr);

    let persist_path = get_persist_path();
    if let Some(parent) = persist_path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        error!("Failed to create persistence directory {:?}: {}", parent, e);
    }

    let psm = PSM.uninit().init_with(Psm::init());
    if let Err(e) = psm.load(&persist_path, matter, NO_NETWORKS) {
        // Starts uncommissioned
        error!(
            "Failed to load persisted state from {:?}: {:?}",
            persist_path, e
        );
    }

    open_commissioning_window(matter, config, &persist_path)?;

    let buffers = BUFFERS.uninit().init_with(PooledBuffers::init(0));
    let subscriptions = SUBSCRIPTIONS
        .uninit()
        .init_with(DefaultSubscriptions::init());

    let devices = DevicesHandler::new(&registry, matter.rand(), &CHANGES);
    let handler = dm_handler(matter, &registry, &netif, &devices);
    let dm = DataModel::new(matter, buffers, subscriptions, handler);
    let responder = DefaultResponder::new(&dm);

    info!(
        "Matter stack running with {} devices. Waiting for controller connections...",
        registry.len()
    );

    let mut transport = pin!(matter.run(&socket, &socket));

    let mdns_socket = bind_udp(MDNS_SOCKET_DEFAULT_BIND_ADDR)?;
    let mdns_socket = async_io::Async::<UdpSocket>::new_nonblocking(mdns_socket)
        .map_err(|e| io_error("create async mDNS socket", e))?;
    mdns_socket
        .get_ref()
        .join_multicast_v6(&MDNS_IPV6_BROADCAST_ADDR, interface_index)
        .map_err(|e| io_error("join IPv6 multicast group", e))?;
    mdns_socket
        .get_ref()
        .join_multicast_v4(&MDNS_IPV4_BROADCAST_ADDR, &ipv4_addr)
        .map_err(|e| io_error("join IPv4 multicast group", e))?;
    info!("mDNS socket bound to {:?}", MDNS_SOCKET_DEFAULT_BIND_ADDR);

    let hostname =
        HOSTNAME.get_or_init(|| gethostname::gethostname().to_string_lossy().into_owned());
    let host = Host {
        id: 0,
        hostname,
        ip: ipv4_addr.octets().into(),
        ipv6: ipv6_addr.octets().into(),
    };

    // Built-in responder answers subtype PTR queries (_S1._sub._matterc._udp)
    let mdns_responder = BuiltinMdnsResponder::new(matter);
    let mut mdns = pin!(mdns_responder.run(
        &mdns_socket,
        &mdns_socket,
        &host,
        Some(ipv4_addr.octets().into()),
        Some(interface_index),
    ));

    let mut respond = pin!(responder.run::<4, 4>());
    let mut dm_job = pin!(dm.run());
    let mut persist = pin!(psm.run(&persist_path, matter, NO_NETWORKS));
    let mut changes = pin!(pump_changes(subscriptions));

    // mDNS shares the executor to avoid RefCell borrow conflicts on Matter state
    let result = select4(
        &mut transport,
        &mut mdns,
        select(&mut respond, &mut dm_job).coalesce(),
        select(&mut persist, &mut changes).coalesce(),
    )
    .coalesce()
    .await;

    if let Err(e) = result {
        error!("Matter stack error: {:?}", e);
        return Err(e);
    }

    Ok(())
}
