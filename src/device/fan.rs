//! Fan device: a power-only fan accessory behind a FanControl cluster.

use super::{
    Aggregator, Device, DeviceEndpoint, DeviceKind, EndpointState, controller_hook, report_hook,
    require,
};
use crate::accessory::FanAccessory;
use crate::error::Result;
use crate::matter::clusters::{ClusterState, FanControlState, FanMode};
use log::{info, warn};
use std::sync::{Arc, Weak};

pub struct FanDevice {
    endpoint: DeviceEndpoint,
    state: Arc<FanControlState>,
    accessory: Option<Arc<dyn FanAccessory>>,
}

impl FanDevice {
    pub fn new(
        endpoint_id: u16,
        name: Option<&str>,
        accessory: Option<Arc<dyn FanAccessory>>,
        aggregator: Option<&Aggregator>,
    ) -> Arc<Self> {
        if accessory.is_none() {
            warn!("[Device] fan accessory is not set");
        }

        let state = Arc::new(FanControlState::new());
        let endpoint = DeviceEndpoint::new(
            endpoint_id,
            DeviceKind::Fan,
            name,
            aggregator,
            accessory.is_some(),
            EndpointState::FanControl(state.clone()),
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

        if device.accessory.is_some()
            && let Err(e) = device.update_accessory()
        {
            warn!("[Device] FanDevice initial update failed: {}", e);
        }

        device
    }

    /// The fan runs whenever PercentSetting is above zero. Null counts as zero.
    pub fn get_endpoint_power(&self) -> bool {
        self.state.percent_setting().unwrap_or(0) != 0
    }

    /// Full speed when on, stopped when off.
    pub fn set_endpoint_power(&self, on: bool) {
        let percent = if on { 100 } else { 0 };
        let mode = if on { FanMode::High } else { FanMode::Off };

        self.state.report_percent_current(percent);
        self.state.report_fan_mode(mode);
        self.state.report_percent_setting(Some(percent));
    }

    pub fn state(&self) -> &Arc<FanControlState> {
        &self.state
    }
}

impl Device for FanDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Fan
    }

    fn endpoint(&self) -> &DeviceEndpoint {
        &self.endpoint
    }

    fn update_accessory(&self) -> Result<()> {
        let accessory = require(&self.accessory, self.kind())?;
        let on = self.get_endpoint_power();
        info!("[Device] Updating FanDevice accessory with power: {}", on);
        accessory.set_power(on);
        Ok(())
    }

    fn report_endpoint(&self) -> Result<()> {
        let accessory = require(&self.accessory, self.kind())?;
        let on = accessory.power();
        info!("[Device] Reporting FanDevice endpoint with power: {}", on);
        self.set_endpoint_power(on);
        Ok(())
    }

    fn identify(&self) -> Result<()> {
        let accessory = require(&self.accessory, self.kind())?;
        info!("[Device] Identifying FanDevice");
        accessory.identify();
        Ok(())
    }
}
