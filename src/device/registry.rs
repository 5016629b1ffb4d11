//! Device registry: builds the configured devices and owns them.

use super::{Aggregator, ButtonDevice, Device, FanDevice, OnOffDevice, WindowDevice};
use crate::accessory::{
    ButtonAccessory, FanAccessory, OnOffAccessory, SimulatedBlind, SimulatedButton,
    SimulatedRelay, WindowAccessory,
};
use crate::config::{DeviceConfig, DeviceKindConfig};
use crate::error::{BridgeError, Result};
use log::info;
use std::sync::Arc;
use std::time::Duration;

/// Endpoint 0 is the root node.
const FIRST_ENDPOINT_ID: u16 = 1;

/// A simulated accessory created for a device, kept so the simulation can drive it.
#[derive(Clone)]
pub enum SimulatedAccessory {
    Relay(Arc<SimulatedRelay>),
    Blind(Arc<SimulatedBlind>),
    Button(Arc<SimulatedButton>),
}

/// All devices of the bridge, in endpoint order.
pub struct DeviceRegistry {
    aggregator: Option<Aggregator>,
    devices: Vec<Arc<dyn Device>>,
    simulated: Vec<SimulatedAccessory>,
}

impl DeviceRegistry {
    /// Build devices from configuration.
    ///
    /// With `aggregate` set, the aggregator takes the first endpoint id and
    /// every device becomes a bridged node below it.
    pub fn from_config(configs: &[DeviceConfig], aggregate: bool) -> Result<Self> {
        let mut ids = EndpointIds::new();

        let aggregator = if aggregate {
            Some(Aggregator::new(ids.next()?))
        } else {
            None
        };

        let mut devices: Vec<Arc<dyn Device>> = Vec::with_capacity(configs.len());
        let mut simulated = Vec::new();

        for config in configs {
            let endpoint_id = ids.next()?;
            let name = config.name.as_deref();
            let aggregator = aggregator.as_ref();

            let device: Arc<dyn Device> = match &config.kind {
                DeviceKindConfig::Light | DeviceKindConfig::PlugIn => {
                    let accessory = if config.detached {
                        None
                    } else {
                        let relay = Arc::new(SimulatedRelay::new(label_or(name, "Relay")));
                        simulated.push(SimulatedAccessory::Relay(relay.clone()));
                        Some(relay as Arc<dyn OnOffAccessory>)
                    };
                    if config.kind == DeviceKindConfig::Light {
                        OnOffDevice::light(endpoint_id, name, accessory, aggregator)
                    } else {
                        OnOffDevice::plug_in(endpoint_id, name, accessory, aggregator)
                    }
                }
                DeviceKindConfig::Fan => {
                    let accessory = if config.detached {
                        None
                    } else {
                        let relay = Arc::new(SimulatedRelay::new(label_or(name, "Fan")));
                        simulated.push(SimulatedAccessory::Relay(relay.clone()));
                        Some(relay as Arc<dyn FanAccessory>)
                    };
                    FanDevice::new(endpoint_id, name, accessory, aggregator)
                }
                DeviceKindConfig::Window {
                    time_to_open_ms,
                    time_to_close_ms,
                } => {
                    let accessory = if config.detached {
                        None
                    } else {
                        let blind = Arc::new(SimulatedBlind::new(
                            label_or(name, "Blind"),
                            Duration::from_millis(*time_to_open_ms),
                            Duration::from_millis(*time_to_close_ms),
                        ));
                        simulated.push(SimulatedAccessory::Blind(blind.clone()));
                        Some(blind as Arc<dyn WindowAccessory>)
                    };
                    WindowDevice::new(endpoint_id, name, accessory, aggregator)
                }
                DeviceKindConfig::Button => {
                    let accessory = if config.detached {
                        None
                    } else {
                        let button = Arc::new(SimulatedButton::new(label_or(name, "Button")));
                        simulated.push(SimulatedAccessory::Button(button.clone()));
                        Some(button as Arc<dyn ButtonAccessory>)
                    };
                    ButtonDevice::new(endpoint_id, name, accessory, aggregator)
                }
            };

            info!(
                "[Device] Registered {} on endpoint {}",
                device.kind(),
                endpoint_id
            );
            devices.push(device);
        }

        Ok(Self {
            aggregator,
            devices,
            simulated,
        })
    }

    pub fn aggregator(&self) -> Option<&Aggregator> {
        self.aggregator.as_ref()
    }

    pub fn devices(&self) -> &[Arc<dyn Device>] {
        &self.devices
    }

    /// Look up the device serving `endpoint_id`.
    pub fn device(&self, endpoint_id: u16) -> Option<&Arc<dyn Device>> {
        self.devices
            .iter()
            .find(|device| device.endpoint().id() == endpoint_id)
    }

    pub fn simulated(&self) -> &[SimulatedAccessory] {
        &self.simulated
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

fn label_or<'a>(name: Option<&'a str>, fallback: &'a str) -> &'a str {
    name.filter(|name| !name.is_empty()).unwrap_or(fallback)
}

/// Sequential endpoint id allocator.
struct EndpointIds {
    next: Option<u16>,
}

impl EndpointIds {
    fn new() -> Self {
        Self {
            next: Some(FIRST_ENDPOINT_ID),
        }
    }

    fn next(&mut self) -> Result<u16> {
        let id = self.next.ok_or(BridgeError::EndpointsExhausted)?;
        // 0xFFFF is the wildcard endpoint and never allocated
        self.next = id.checked_add(1).filter(|next| *next != u16::MAX);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_devices;
    use crate::device::{DeviceKind, EndpointState};

    #[test]
    fn test_aggregated_ids_start_after_aggregator() {
        let registry = DeviceRegistry::from_config(&default_devices(), true).unwrap();

        assert_eq!(registry.aggregator().map(Aggregator::endpoint_id), Some(1));
        let ids: Vec<u16> = registry
            .devices()
            .iter()
            .map(|device| device.endpoint().id())
            .collect();
        assert_eq!(ids, vec![2, 3, 4, 5, 6]);
        assert!(
            registry
                .devices()
                .iter()
                .all(|device| device.endpoint().parent() == Some(1))
        );
    }

    #[test]
    fn test_standalone_ids_start_at_one() {
        let registry = DeviceRegistry::from_config(&default_devices(), false).unwrap();

        assert!(registry.aggregator().is_none());
        assert_eq!(registry.devices()[0].endpoint().id(), 1);
        assert!(!registry.devices()[0].endpoint().is_bridged());
    }

    #[test]
    fn test_kinds_follow_config_order() {
        let registry = DeviceRegistry::from_config(&default_devices(), true).unwrap();
        let kinds: Vec<DeviceKind> = registry.devices().iter().map(|d| d.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                DeviceKind::Light,
                DeviceKind::PlugIn,
                DeviceKind::Fan,
                DeviceKind::Window,
                DeviceKind::Button,
            ]
        );
        assert!(matches!(
            registry.device(5).map(|d| d.endpoint().state()),
            Some(EndpointState::WindowCovering(_))
        ));
    }

    #[test]
    fn test_detached_devices_get_no_accessory() {
        let mut config = DeviceConfig::new("Spare", DeviceKindConfig::PlugIn);
        config.detached = true;
        let lamp = DeviceConfig::new("Lamp", DeviceKindConfig::Light);
        let registry = DeviceRegistry::from_config(&[config, lamp], true).unwrap();

        assert_eq!(registry.simulated().len(), 1);
        let spare = registry.device(2).unwrap();
        assert!(matches!(
            spare.update_accessory(),
            Err(BridgeError::AccessoryMissing(_))
        ));
        // Reachable mirrors accessory presence
        let info = spare.endpoint().bridged_info().unwrap();
        assert!(!info.reachable());
    }

    #[test]
    fn test_lookup_unknown_endpoint() {
        let registry = DeviceRegistry::from_config(&default_devices(), true).unwrap();
        assert!(registry.device(0).is_none());
        assert!(registry.device(1).is_none());
        assert!(registry.device(99).is_none());
    }

    #[test]
    fn test_endpoint_ids_exhaust() {
        let mut ids = EndpointIds {
            next: Some(u16::MAX - 1),
        };
        assert_eq!(ids.next().unwrap(), u16::MAX - 1);
        assert!(matches!(ids.next(), Err(BridgeError::EndpointsExhausted)));
    }
}
