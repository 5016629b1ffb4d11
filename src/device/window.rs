//! Window device: a motorized blind behind a WindowCovering cluster.
//!
//! The endpoint speaks hundredths of a percent, the accessory whole percent.

use super::{
    Aggregator, Device, DeviceEndpoint, DeviceKind, EndpointState, controller_hook, report_hook,
    require,
};
use crate::accessory::WindowAccessory;
use crate::error::{BridgeError, Result};
use crate::matter::clusters::{ClusterState, WindowCoveringState};
use log::{info, warn};
use std::sync::{Arc, Weak};

pub struct WindowDevice {
    endpoint: DeviceEndpoint,
    state: Arc<WindowCoveringState>,
    accessory: Option<Arc<dyn WindowAccessory>>,
}

impl WindowDevice {
    pub fn new(
        endpoint_id: u16,
        name: Option<&str>,
        accessory: Option<Arc<dyn WindowAccessory>>,
        aggregator: Option<&Aggregator>,
    ) -> Arc<Self> {
        if accessory.is_none() {
            warn!("[Device] window accessory is not set");
        }

        let state = Arc::new(WindowCoveringState::new());
        let endpoint = DeviceEndpoint::new(
            endpoint_id,
            DeviceKind::Window,
            name,
            aggregator,
            accessory.is_some(),
            EndpointState::WindowCovering(state.clone()),
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

        // Start from where the blind actually is
        if device.accessory.is_some()
            && let Err(e) = device.report_endpoint()
        {
            warn!("[Device] WindowDevice initial report failed: {}", e);
        }

        device
    }

    /// Target in whole percent. Null counts as fully open.
    pub fn get_endpoint_target(&self) -> u16 {
        self.state.target_percent100ths().unwrap_or(0) / 100
    }

    pub fn set_endpoint_target(&self, position: u16) -> Result<()> {
        self.state.report_target(to_percent100ths(position)?);
        Ok(())
    }

    pub fn set_endpoint_current(&self, position: u16) -> Result<()> {
        self.state.report_current(to_percent100ths(position)?);
        Ok(())
    }

    pub fn state(&self) -> &Arc<WindowCoveringState> {
        &self.state
    }
}

fn to_percent100ths(position: u16) -> Result<u16> {
    if position > 100 {
        return Err(BridgeError::InvalidPosition(position));
    }
    Ok(position * 100)
}

impl Device for WindowDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Window
    }

    fn endpoint(&self) -> &DeviceEndpoint {
        &self.endpoint
    }

    fn update_accessory(&self) -> Result<()> {
        let accessory = require(&self.accessory, self.kind())?;
        let target = self.get_endpoint_target();
        info!(
            "[Device] Updating WindowDevice accessory with target position: {}",
            target
        );
        accessory.move_to(target);
        Ok(())
    }

    fn report_endpoint(&self) -> Result<()> {
        let accessory = require(&self.accessory, self.kind())?;
        let current = accessory.current_position();
        let target = accessory.target_position();
        info!(
            "[Device] Reporting WindowDevice endpoint with target position: {}",
            target
        );
        self.set_endpoint_current(current)?;
        self.set_endpoint_target(target)
    }

    fn identify(&self) -> Result<()> {
        let accessory = require(&self.accessory, self.kind())?;
        info!("[Device] Identifying WindowDevice");
        accessory.identify();
        Ok(())
    }
}
