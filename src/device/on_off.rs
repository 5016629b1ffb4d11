//! Lights and plug-in units: a relay accessory behind an OnOff cluster.

use super::{
    Aggregator, Device, DeviceEndpoint, DeviceKind, EndpointState, controller_hook, report_hook,
    require,
};
use crate::accessory::OnOffAccessory;
use crate::error::Result;
use crate::matter::clusters::{ClusterState, OnOffState};
use log::{info, warn};
use std::sync::{Arc, Weak};

/// On/off device, exposed as an On/Off Light or an On/Off Plug-in Unit.
pub struct OnOffDevice {
    endpoint: DeviceEndpoint,
    state: Arc<OnOffState>,
    accessory: Option<Arc<dyn OnOffAccessory>>,
}

impl OnOffDevice {
    pub fn light(
        endpoint_id: u16,
        name: Option<&str>,
        accessory: Option<Arc<dyn OnOffAccessory>>,
        aggregator: Option<&Aggregator>,
    ) -> Arc<Self> {
        Self::new(DeviceKind::Light, endpoint_id, name, accessory, aggregator)
    }

    pub fn plug_in(
        endpoint_id: u16,
        name: Option<&str>,
        accessory: Option<Arc<dyn OnOffAccessory>>,
        aggregator: Option<&Aggregator>,
    ) -> Arc<Self> {
        Self::new(DeviceKind::PlugIn, endpoint_id, name, accessory, aggregator)
    }

    fn new(
        kind: DeviceKind,
        endpoint_id: u16,
        name: Option<&str>,
        accessory: Option<Arc<dyn OnOffAccessory>>,
        aggregator: Option<&Aggregator>,
    ) -> Arc<Self> {
        if accessory.is_none() {
            warn!("[Device] {} accessory is not set", kind);
        }

        let state = Arc::new(OnOffState::new(false));
        let endpoint = DeviceEndpoint::new(
            endpoint_id,
            kind,
            name,
            aggregator,
            accessory.is_some(),
            EndpointState::OnOff(state.clone()),
        );

        let device = Arc::new_cyclic(|weak: &Weak<Self>| {
            state.set_controller_hook(controller_hook(weak.clone()));
            if let Some(accessory) = &accessory {
                accessory.set_report_callback(report_hook(weak.clone()));
            }
            Self {
                endpoint,
                state,
                accessory,
            }
        });

        // Bring the relay in line with the endpoint
        if device.accessory.is_some()
            && let Err(e) = device.update_accessory()
        {
            warn!("[Device] {} initial update failed: {}", kind, e);
        }

        device
    }

    pub fn get_endpoint_power(&self) -> bool {
        self.state.get()
    }

    pub fn set_endpoint_power(&self, on: bool) {
        self.state.report(on);
    }

    pub fn state(&self) -> &Arc<OnOffState> {
        &self.state
    }
}

impl Device for OnOffDevice {
    fn kind(&self) -> DeviceKind {
        self.endpoint.kind()
    }

    fn endpoint(&self) -> &DeviceEndpoint {
        &self.endpoint
    }

    fn update_accessory(&self) -> Result<()> {
        let accessory = require(&self.accessory, self.kind())?;
        let on = self.get_endpoint_power();
        info!(
            "[Device] Updating {} accessory with power: {}",
            self.kind(),
            on
        );
        accessory.set_power(on);
        Ok(())
    }

    fn report_endpoint(&self) -> Result<()> {
        let accessory = require(&self.accessory, self.kind())?;
        let on = accessory.power();
        info!(
            "[Device] Reporting {} endpoint with power: {}",
            self.kind(),
            on
        );
        self.set_endpoint_power(on);
        Ok(())
    }

    fn identify(&self) -> Result<()> {
        let accessory = require(&self.accessory, self.kind())?;
        info!("[Device] Identifying {}", self.kind());
        accessory.identify();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rs_matter::dm::clusters::on_off::OnOffHooks;
    use crate::accessory::SimulatedRelay;
    use crate::error::BridgeError;

    fn light_with_relay() -> (Arc<OnOffDevice>, Arc<SimulatedRelay>) {
        let relay = Arc::new(SimulatedRelay::new("Lamp"));
        let device = OnOffDevice::light(3, Some("Lamp"), Some(relay.clone()), None);
        (device, relay)
    }

    #[test]
    fn test_construction_pushes_endpoint_power() {
        let relay = Arc::new(SimulatedRelay::new("Plug"));
        OnOffAccessory::set_power(relay.as_ref(), true);

        let device = OnOffDevice::plug_in(2, None, Some(relay.clone()), None);
        assert!(!device.get_endpoint_power());
        assert!(!OnOffAccessory::power(relay.as_ref()));
    }

    #[test]
    fn test_controller_command_reaches_accessory() {
        let (device, relay) = light_with_relay();

        device.state().command(true);
        assert!(OnOffAccessory::power(relay.as_ref()));

        // rs-matter's OnOff handler writes through the hooks
        OnOffHooks::set_on_off(device.state().as_ref(), false);
        assert!(!OnOffAccessory::power(relay.as_ref()));
    }

    #[test]
    fn test_physical_press_reaches_endpoint() {
        let (device, relay) = light_with_relay();

        relay.press_button();
        assert!(device.get_endpoint_power());

        relay.press_button();
        assert!(!device.get_endpoint_power());
    }

    #[test]
    fn test_identify_forwards_to_accessory() {
        let (device, relay) = light_with_relay();
        device.identify().unwrap();
        assert_eq!(relay.identify_count(), 1);
    }

    #[test]
    fn test_missing_accessory() {
        let device = OnOffDevice::light(5, Some("Ghost"), None, None);
        assert!(matches!(
            device.update_accessory(),
            Err(BridgeError::AccessoryMissing(_))
        ));
        assert!(matches!(
            device.report_endpoint(),
            Err(BridgeError::AccessoryMissing(_))
        ));
        assert!(device.identify().is_err());

        // The endpoint still works on its own
        device.state().command(true);
        assert!(device.get_endpoint_power());
    }

    #[test]
    fn test_kinds_and_device_types() {
        let light = OnOffDevice::light(1, None, None, None);
        let plug = OnOffDevice::plug_in(2, None, None, None);
        assert_eq!(light.kind(), DeviceKind::Light);
        assert_eq!(plug.kind().device_type().dtype, 0x010A);
    }
}
