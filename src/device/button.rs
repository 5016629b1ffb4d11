//! Button device: a stateless momentary button behind a GenericSwitch cluster.
//!
//! The button has nothing a controller can change, so only the accessory to
//! endpoint direction carries data. Each detected press becomes one event.

use super::{Aggregator, Device, DeviceEndpoint, DeviceKind, EndpointState, report_hook, require};
use crate::accessory::{ButtonAccessory, PressType};
use crate::error::Result;
use crate::matter::clusters::GenericSwitchState;
use log::{info, warn};
use std::sync::{Arc, Weak};

/// Position of a released momentary switch.
const RELEASED: u8 = 0;

pub struct ButtonDevice {
    endpoint: DeviceEndpoint,
    state: Arc<GenericSwitchState>,
    accessory: Option<Arc<dyn ButtonAccessory>>,
}

impl ButtonDevice {
    pub fn new(
        endpoint_id: u16,
        name: Option<&str>,
        accessory: Option<Arc<dyn ButtonAccessory>>,
        aggregator: Option<&Aggregator>,
    ) -> Arc<Self> {
        if accessory.is_none() {
            warn!("[Device] button accessory is not set");
        }

        let state = Arc::new(GenericSwitchState::new());
        state.set_endpoint_id(endpoint_id);
        let endpoint = DeviceEndpoint::new(
            endpoint_id,
            DeviceKind::Button,
            name,
            aggregator,
            accessory.is_some(),
            EndpointState::GenericSwitch(state.clone()),
        );

        Arc::new_cyclic(|weak: &Weak<Self>| {
            if let Some(accessory) = &accessory {
                accessory.set_report_callback(report_hook(weak.clone()));
            }
            Self {
                endpoint,
                state,
                accessory,
            }
        })
    }

    /// Publish one press: the switch is back at rest, then the event.
    pub fn report_press(&self, press: Option<PressType>) -> Result<()> {
        self.state.report_current_position(RELEASED);

        match press {
            Some(PressType::SinglePress) => {
                self.state.emit_multi_press_complete(RELEASED, 1)?;
            }
            Some(PressType::DoublePress) => {
                self.state.emit_multi_press_complete(RELEASED, 2)?;
            }
            Some(PressType::LongPress) => {
                self.state.emit_long_press(RELEASED)?;
            }
            None => {}
        }
        Ok(())
    }

    pub fn state(&self) -> &Arc<GenericSwitchState> {
        &self.state
    }
}

impl Device for ButtonDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Button
    }

    fn endpoint(&self) -> &DeviceEndpoint {
        &self.endpoint
    }

    /// Nothing to push: a momentary button has no controllable state.
    fn update_accessory(&self) -> Result<()> {
        Ok(())
    }

    fn report_endpoint(&self) -> Result<()> {
        let accessory = require(&self.accessory, self.kind())?;
        let press = accessory.last_press_type();
        info!("[Device] Reporting ButtonDevice endpoint with press: {:?}", press);
        self.report_press(press)
    }

    fn identify(&self) -> Result<()> {
        info!("[Device] Identifying ButtonDevice");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessory::SimulatedButton;
    use crate::matter::clusters::ClusterState;
    use crate::matter::clusters::generic_switch::events;

    fn button_with_accessory() -> (Arc<ButtonDevice>, Arc<SimulatedButton>) {
        let button = Arc::new(SimulatedButton::new("Button"));
        let device = ButtonDevice::new(8, Some("Button"), Some(button.clone()), None);
        (device, button)
    }

    #[test]
    fn test_single_press_emits_multi_press_complete() {
        let (device, button) = button_with_accessory();

        button.press(PressType::SinglePress);

        let pending = device.state().pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_id, events::MULTI_PRESS_COMPLETE);
        assert_eq!(pending[0].endpoint_id, 8);
        assert_eq!(
            pending[0].payload.as_slice(),
            &[0x15, 0x24, 0x00, 0x00, 0x24, 0x01, 0x01, 0x18]
        );
    }

    #[test]
    fn test_double_press_counts_two() {
        let (device, button) = button_with_accessory();

        button.press(PressType::DoublePress);

        let pending = device.state().pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_id, events::MULTI_PRESS_COMPLETE);
        assert_eq!(pending[0].payload[6], 2);
    }

    #[test]
    fn test_long_press_emits_long_press() {
        let (device, button) = button_with_accessory();

        button.press(PressType::LongPress);

        let pending = device.state().pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_id, events::LONG_PRESS);
    }

    #[test]
    fn test_no_press_emits_nothing() {
        let (device, _) = button_with_accessory();
        let version = device.state().version();

        device.report_endpoint().unwrap();
        assert!(device.state().pending().is_empty());
        assert_eq!(device.state().current_position(), 0);
        assert_eq!(device.state().version(), version);
    }

    #[test]
    fn test_presses_keep_order() {
        let (device, button) = button_with_accessory();

        button.press(PressType::LongPress);
        button.press(PressType::SinglePress);

        let pending = device.state().pending();
        assert_eq!(pending.len(), 2);
        assert!(pending[0].event_number < pending[1].event_number);
        assert_eq!(pending[0].event_id, events::LONG_PRESS);
    }

    #[test]
    fn test_without_accessory() {
        let device = ButtonDevice::new(9, None, None, None);
        assert!(device.update_accessory().is_ok());
        assert!(device.identify().is_ok());
        assert!(device.report_endpoint().is_err());
    }
}
