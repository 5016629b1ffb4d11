//! Data-model node built from the device registry.
//!
//! The endpoint layout is only known after configuration is read, so the
//! endpoint and cluster tables are assembled at startup and leaked: rs-matter
//! needs them for the lifetime of the stack.

use super::clusters::{
    BridgedHandler, FanControlHandler, GenericSwitchHandler, IdentifyHandler,
    WindowCoveringHandler, on_off,
};
use super::device_types::{DEV_TYPE_AGGREGATOR, DEV_TYPE_BRIDGED_NODE};
use crate::device::{Device, DeviceRegistry, EndpointState};
use rs_matter::dm::clusters::desc::{self, ClusterHandler as _};
use rs_matter::dm::clusters::net_comm::NetworkType;
use rs_matter::dm::{Cluster, DeviceType, Endpoint, Node, endpoints};

/// Cluster served by the functional state of an endpoint.
pub fn functional_cluster(state: &EndpointState) -> Cluster<'static> {
    match state {
        EndpointState::OnOff(_) => on_off::CLUSTER,
        EndpointState::FanControl(_) => FanControlHandler::CLUSTER,
        EndpointState::WindowCovering(_) => WindowCoveringHandler::CLUSTER,
        EndpointState::GenericSwitch(_) => GenericSwitchHandler::CLUSTER,
    }
}

/// Endpoint of one device: its device type plus Bridged Node when bridged.
pub fn device_endpoint(device: &dyn Device) -> Endpoint<'static> {
    let endpoint = device.endpoint();

    let mut device_types: Vec<DeviceType> = vec![device.kind().device_type()];
    let mut clusters: Vec<Cluster<'static>> = vec![
        desc::DescHandler::CLUSTER,
        IdentifyHandler::CLUSTER,
        functional_cluster(endpoint.state()),
    ];

    if let Some(info) = endpoint.bridged_info() {
        device_types.push(DEV_TYPE_BRIDGED_NODE);
        clusters.push(BridgedHandler::cluster_for(info));
    }

    Endpoint {
        id: endpoint.id(),
        device_types: leak(device_types),
        clusters: leak(clusters),
    }
}

/// Root endpoint, the aggregator if any, then every device in endpoint order.
pub fn build_node(registry: &DeviceRegistry) -> Node<'static> {
    let mut endpoints = vec![endpoints::root_endpoint(NetworkType::Ethernet)];

    if let Some(aggregator) = registry.aggregator() {
        endpoints.push(Endpoint {
            id: aggregator.endpoint_id(),
            device_types: leak(vec![DEV_TYPE_AGGREGATOR]),
            clusters: leak(vec![desc::DescHandler::CLUSTER]),
        });
    }

    endpoints.extend(
        registry
            .devices()
            .iter()
            .map(|device| device_endpoint(device.as_ref())),
    );

    Node {
        id: 0,
        endpoints: leak(endpoints),
    }
}

fn leak<T>(items: Vec<T>) -> &'static [T] {
    Box::leak(items.into_boxed_slice())
}
