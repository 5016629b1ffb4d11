//! Device bindings between accessories and Matter endpoints.
//!
//! Each device owns one endpoint and one accessory. Values flow both ways:
//! - a controller changes the endpoint, the cluster state calls the
//!   device's controller hook, and [`Device::update_accessory`] pushes the
//!   endpoint value to the accessory;
//! - the accessory changes physically, calls its report callback, and
//!   [`Device::report_endpoint`] copies the accessory value to the endpoint.
//!
//! Both hooks hold a `Weak` reference to the device so the accessory and the
//! cluster state never keep it alive.

pub mod button;
pub mod fan;
pub mod on_off;
pub mod registry;
pub mod window;

use crate::accessory::ReportCallback;
use crate::callback::Callback;
use crate::error::{BridgeError, Result};
use crate::matter::clusters::bridged_device_basic_info::MAX_NODE_LABEL_LEN;
use crate::matter::clusters::{
    BridgedInfo, FanControlState, GenericSwitchState, OnOffState, WindowCoveringState,
};
use crate::matter::device_types::{
    DEV_TYPE_FAN, DEV_TYPE_GENERIC_SWITCH, DEV_TYPE_ON_OFF_LIGHT, DEV_TYPE_ON_OFF_PLUG_IN_UNIT,
    DEV_TYPE_WINDOW_COVERING,
};
use log::{info, warn};
use rs_matter::dm::DeviceType;
use std::fmt;
use std::sync::{Arc, Weak};

pub use button::ButtonDevice;
pub use fan::FanDevice;
pub use on_off::OnOffDevice;
pub use registry::{DeviceRegistry, SimulatedAccessory};
pub use window::WindowDevice;

/// The kinds of device the bridge can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Light,
    PlugIn,
    Fan,
    Window,
    Button,
}

impl DeviceKind {
    pub fn device_type(self) -> DeviceType {
        match self {
            DeviceKind::Light => DEV_TYPE_ON_OFF_LIGHT,
            DeviceKind::PlugIn => DEV_TYPE_ON_OFF_PLUG_IN_UNIT,
            DeviceKind::Fan => DEV_TYPE_FAN,
            DeviceKind::Window => DEV_TYPE_WINDOW_COVERING,
            DeviceKind::Button => DEV_TYPE_GENERIC_SWITCH,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceKind::Light => "LightDevice",
            DeviceKind::PlugIn => "PlugInDevice",
            DeviceKind::Fan => "FanDevice",
            DeviceKind::Window => "WindowDevice",
            DeviceKind::Button => "ButtonDevice",
        };
        f.write_str(name)
    }
}

/// The aggregator endpoint bridged devices hang off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregator {
    endpoint_id: u16,
}

impl Aggregator {
    pub fn new(endpoint_id: u16) -> Self {
        info!("[Device] Creating aggregator endpoint {}", endpoint_id);
        Self { endpoint_id }
    }

    pub fn endpoint_id(&self) -> u16 {
        self.endpoint_id
    }
}

/// The functional cluster state behind an endpoint.
#[derive(Clone)]
pub enum EndpointState {
    OnOff(Arc<OnOffState>),
    FanControl(Arc<FanControlState>),
    WindowCovering(Arc<WindowCoveringState>),
    GenericSwitch(Arc<GenericSwitchState>),
}

/// Metadata and state of a device's Matter endpoint.
pub struct DeviceEndpoint {
    id: u16,
    kind: DeviceKind,
    parent: Option<u16>,
    bridged: Option<Arc<BridgedInfo>>,
    state: EndpointState,
}

impl DeviceEndpoint {
    /// Place the endpoint standalone, or as a bridged node under `aggregator`.
    pub fn new(
        id: u16,
        kind: DeviceKind,
        name: Option<&str>,
        aggregator: Option<&Aggregator>,
        reachable: bool,
        state: EndpointState,
    ) -> Self {
        let (parent, bridged) = match aggregator {
            Some(aggregator) => {
                let label = node_label(kind, name);
                (
                    Some(aggregator.endpoint_id()),
                    Some(Arc::new(BridgedInfo::new(label, reachable))),
                )
            }
            None => {
                info!("[Device] Creating {} standalone endpoint", kind);
                (None, None)
            }
        };

        Self {
            id,
            kind,
            parent,
            bridged,
            state,
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Aggregator endpoint, when bridged.
    pub fn parent(&self) -> Option<u16> {
        self.parent
    }

    pub fn is_bridged(&self) -> bool {
        self.bridged.is_some()
    }

    pub fn bridged_info(&self) -> Option<&Arc<BridgedInfo>> {
        self.bridged.as_ref()
    }

    /// NodeLabel exposed to controllers, if any.
    pub fn label(&self) -> Option<&str> {
        self.bridged.as_deref().and_then(BridgedInfo::label)
    }

    pub fn state(&self) -> &EndpointState {
        &self.state
    }
}

/// Validate a device name for use as NodeLabel.
fn node_label(kind: DeviceKind, name: Option<&str>) -> Option<String> {
    match name {
        Some(name) if !name.is_empty() && name.len() <= MAX_NODE_LABEL_LEN => {
            info!("[Device] Creating bridged node {} with name: {}", kind, name);
            Some(name.to_string())
        }
        _ => {
            warn!("[Device] device name is not set");
            info!("[Device] Creating bridged node {} with default name", kind);
            None
        }
    }
}

/// Common behaviour of every bound device.
pub trait Device: Send + Sync {
    fn kind(&self) -> DeviceKind;

    fn endpoint(&self) -> &DeviceEndpoint;

    /// Push the endpoint's value to the accessory.
    fn update_accessory(&self) -> Result<()>;

    /// Copy the accessory's value to the endpoint.
    fn report_endpoint(&self) -> Result<()>;

    /// Ask the accessory to identify itself.
    fn identify(&self) -> Result<()>;
}

/// Borrow the accessory or fail with [`BridgeError::AccessoryMissing`].
pub(crate) fn require<'a, T: ?Sized>(
    accessory: &'a Option<Arc<T>>,
    kind: DeviceKind,
) -> Result<&'a Arc<T>> {
    accessory
        .as_ref()
        .ok_or_else(|| BridgeError::AccessoryMissing(kind.to_string()))
}

/// Hook run by a cluster state after a controller changed it.
pub(crate) fn controller_hook<D: Device + 'static>(device: Weak<D>) -> Callback {
    Arc::new(move || {
        if let Some(device) = device.upgrade()
            && let Err(e) = device.update_accessory()
        {
            warn!(
                "[Device] {} on endpoint {}: update failed: {}",
                device.kind(),
                device.endpoint().id(),
                e
            );
        }
    })
}

/// Callback registered with the accessory for physical state changes.
pub(crate) fn report_hook<D: Device + 'static>(device: Weak<D>) -> ReportCallback {
    Arc::new(move || {
        if let Some(device) = device.upgrade()
            && let Err(e) = device.report_endpoint()
        {
            warn!(
                "[Device] {} on endpoint {}: report failed: {}",
                device.kind(),
                device.endpoint().id(),
                e
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_off_state() -> EndpointState {
        EndpointState::OnOff(Arc::new(OnOffState::new(false)))
    }

    #[test]
    fn test_standalone_endpoint_has_no_bridged_info() {
        let endpoint = DeviceEndpoint::new(
            1,
            DeviceKind::Light,
            Some("Lamp"),
            None,
            true,
            on_off_state(),
        );
        assert!(!endpoint.is_bridged());
        assert_eq!(endpoint.parent(), None);
        assert_eq!(endpoint.label(), None);
    }

    #[test]
    fn test_bridged_endpoint_gets_label() {
        let aggregator = Aggregator::new(1);
        let endpoint = DeviceEndpoint::new(
            2,
            DeviceKind::PlugIn,
            Some("Kettle"),
            Some(&aggregator),
            true,
            on_off_state(),
        );
        assert_eq!(endpoint.parent(), Some(1));
        assert_eq!(endpoint.label(), Some("Kettle"));
    }

    #[test]
    fn test_invalid_names_use_default_label() {
        let aggregator = Aggregator::new(1);
        let long_name = "x".repeat(64);

        for name in [None, Some(""), Some(long_name.as_str())] {
            let endpoint = DeviceEndpoint::new(
                2,
                DeviceKind::Light,
                name,
                Some(&aggregator),
                true,
                on_off_state(),
            );
            assert!(endpoint.is_bridged());
            assert_eq!(endpoint.label(), None);
        }
    }

    #[test]
    fn test_label_at_length_limit_is_accepted() {
        let aggregator = Aggregator::new(1);
        let name = "y".repeat(63);
        let endpoint = DeviceEndpoint::new(
            2,
            DeviceKind::Fan,
            Some(&name),
            Some(&aggregator),
            true,
            EndpointState::FanControl(Arc::new(FanControlState::new())),
        );
        assert_eq!(endpoint.label(), Some(name.as_str()));
    }

    #[test]
    fn test_require_reports_missing_accessory() {
        let missing: Option<Arc<dyn crate::accessory::OnOffAccessory>> = None;
        let err = require(&missing, DeviceKind::Light).unwrap_err();
        assert!(matches!(err, BridgeError::AccessoryMissing(_)));
    }

    #[test]
    fn test_device_type_per_kind() {
        assert_eq!(DeviceKind::Window.device_type().dtype, 0x0202);
        assert_eq!(DeviceKind::Button.device_type().dtype, 0x000F);
    }
}
