//! FanControl cluster (0x0202).
//!
//! Only the mandatory attributes are served. The fan is modelled as an
//! Off/Low/Medium/High fan whose PercentCurrent follows the setting.

use super::{ClusterState, StateCore, sync_dataver_with_state};
use crate::callback::Callback;
use crate::matter::notifier::ClusterNotifier;
use parking_lot::Mutex;
use rs_matter::dm::{
    Access, Attribute, Cluster, Dataver, Handler, NonBlockingHandler, Quality, ReadContext,
    ReadReply, Reply, WriteContext,
};
use rs_matter::error::{Error, ErrorCode};
use rs_matter::tlv::{TLVElement, TLVWrite};
use rs_matter::{attribute_enum, attributes, with};
use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use strum::FromRepr;

/// Matter Cluster ID for FanControl
pub const CLUSTER_ID: u32 = 0x0202;

/// Cluster revision
pub const CLUSTER_REVISION: u16 = 4;

/// FanModeSequence value for Off/Low/Medium/High
pub const FAN_MODE_SEQUENCE_OFF_LOW_MED_HIGH: u8 = 0;

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum FanControlAttribute {
    FanMode = 0x0000,
    FanModeSequence = 0x0001,
    PercentSetting = 0x0002,
    PercentCurrent = 0x0003,
}

attribute_enum!(FanControlAttribute);

/// FanModeEnum values.
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u8)]
pub enum FanMode {
    Off = 0,
    Low = 1,
    Medium = 2,
    High = 3,
    On = 4,
    Auto = 5,
    Smart = 6,
}

impl FanMode {
    /// Speed a controller-selected mode maps to. `None` leaves the setting alone.
    pub fn percent(self) -> Option<u8> {
        match self {
            FanMode::Off => Some(0),
            FanMode::Low => Some(33),
            FanMode::Medium => Some(66),
            FanMode::High | FanMode::On => Some(100),
            FanMode::Auto | FanMode::Smart => None,
        }
    }

    /// Mode matching a speed percentage.
    pub fn from_percent(percent: u8) -> Self {
        match percent {
            0 => FanMode::Off,
            1..=33 => FanMode::Low,
            34..=66 => FanMode::Medium,
            _ => FanMode::High,
        }
    }
}

pub const CLUSTER: Cluster<'static> = Cluster {
    id: CLUSTER_ID,
    revision: CLUSTER_REVISION,
    feature_map: 0,
    attributes: attributes!(
        Attribute::new(
            FanControlAttribute::FanMode as _,
            Access::RWVM,
            Quality::NONE
        ),
        Attribute::new(
            FanControlAttribute::FanModeSequence as _,
            Access::RV,
            Quality::FIXED
        ),
        Attribute::new(
            FanControlAttribute::PercentSetting as _,
            Access::RWVM,
            Quality::NULLABLE
        ),
        Attribute::new(
            FanControlAttribute::PercentCurrent as _,
            Access::RV,
            Quality::NONE
        ),
    ),
    commands: &[],
    with_attrs: with!(all),
    with_cmds: with!(all),
};

#[derive(Debug, Clone, Copy)]
struct FanValues {
    mode: FanMode,
    percent_setting: Option<u8>,
    percent_current: u8,
}

/// Shared fan state of one endpoint.
pub struct FanControlState {
    values: Mutex<FanValues>,
    core: StateCore,
}

impl FanControlState {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(FanValues {
                mode: FanMode::Off,
                percent_setting: Some(0),
                percent_current: 0,
            }),
            core: StateCore::new(),
        }
    }

    pub fn fan_mode(&self) -> FanMode {
        self.values.lock().mode
    }

    pub fn percent_setting(&self) -> Option<u8> {
        self.values.lock().percent_setting
    }

    pub fn percent_current(&self) -> u8 {
        self.values.lock().percent_current
    }

    pub fn report_fan_mode(&self, mode: FanMode) {
        let changed = {
            let mut values = self.values.lock();
            std::mem::replace(&mut values.mode, mode) != mode
        };
        if changed {
            self.core.changed(FanControlAttribute::FanMode as u32);
        }
    }

    pub fn report_percent_setting(&self, percent: Option<u8>) {
        let changed = {
            let mut values = self.values.lock();
            std::mem::replace(&mut values.percent_setting, percent) != percent
        };
        if changed {
            self.core.changed(FanControlAttribute::PercentSetting as u32);
        }
    }

    pub fn report_percent_current(&self, percent: u8) {
        let changed = {
            let mut values = self.values.lock();
            std::mem::replace(&mut values.percent_current, percent) != percent
        };
        if changed {
            self.core.changed(FanControlAttribute::PercentCurrent as u32);
        }
    }

    /// Controller wrote FanMode.
    pub fn write_fan_mode(&self, mode: FanMode) -> Result<(), Error> {
        if mode == FanMode::Smart {
            return Err(ErrorCode::ConstraintError.into());
        }

        log::info!("[Matter] FanControl: FanMode set to {:?}", mode);
        let stored = if mode == FanMode::On {
            FanMode::High
        } else {
            mode
        };
        self.report_fan_mode(stored);
        if let Some(percent) = mode.percent() {
            self.report_percent_setting(Some(percent));
            self.report_percent_current(percent);
        }
        self.core.controller_changed();
        Ok(())
    }

    /// Controller wrote PercentSetting.
    pub fn write_percent_setting(&self, percent: Option<u8>) -> Result<(), Error> {
        let Some(percent) = percent else {
            return Err(ErrorCode::InvalidAction.into());
        };
        if percent > 100 {
            return Err(ErrorCode::ConstraintError.into());
        }

        log::info!("[Matter] FanControl: PercentSetting set to {}%", percent);
        self.report_percent_setting(Some(percent));
        self.report_fan_mode(FanMode::from_percent(percent));
        self.report_percent_current(percent);
        self.core.controller_changed();
        Ok(())
    }
}

impl Default for FanControlState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterState for FanControlState {
    fn version(&self) -> u32 {
        self.core.version()
    }

    fn set_notifier(&self, notifier: ClusterNotifier) {
        self.core.set_notifier(notifier);
    }

    fn set_controller_hook(&self, hook: Callback) {
        self.core.set_controller_hook(hook);
    }
}

/// Handler serving a [`FanControlState`].
pub struct FanControlHandler {
    dataver: Dataver,
    state: Arc<FanControlState>,
    last_state_version: AtomicU32,
}

impl FanControlHandler {
    pub const CLUSTER: Cluster<'static> = CLUSTER;

    pub fn new(dataver: Dataver, state: Arc<FanControlState>) -> Self {
        Self {
            dataver,
            state,
            last_state_version: AtomicU32::new(0),
        }
    }

    fn read_impl(&self, ctx: impl ReadContext, reply: impl ReadReply) -> Result<(), Error> {
        sync_dataver_with_state(&*self.state, &self.last_state_version, &self.dataver);

        let attr = ctx.attr();

        let Some(mut writer) = reply.with_dataver(self.dataver.get())? else {
            return Ok(());
        };

        if attr.is_system() {
            return CLUSTER.read(attr, writer);
        }

        let tag = writer.tag();
        {
            let mut tw = writer.writer();

            match attr.attr_id.try_into()? {
                FanControlAttribute::FanMode => {
                    tw.u8(tag, self.state.fan_mode() as u8)?;
                }
                FanControlAttribute::FanModeSequence => {
                    tw.u8(tag, FAN_MODE_SEQUENCE_OFF_LOW_MED_HIGH)?;
                }
                FanControlAttribute::PercentSetting => match self.state.percent_setting() {
                    Some(percent) => tw.u8(tag, percent)?,
                    None => tw.null(tag)?,
                },
                FanControlAttribute::PercentCurrent => {
                    tw.u8(tag, self.state.percent_current())?;
                }
            }
        }

        writer.complete()
    }

    fn write_impl(&self, ctx: impl WriteContext) -> Result<(), Error> {
        let attr = ctx.attr();
        attr.check_dataver(self.dataver.get())?;

        self.write_attr(attr.attr_id.try_into()?, ctx.data())
    }

    fn write_attr(&self, attr: FanControlAttribute, data: &TLVElement<'_>) -> Result<(), Error> {
        match attr {
            FanControlAttribute::FanMode => {
                let mode = FanMode::from_repr(data.u8()?)
                    .ok_or_else(|| Error::new(ErrorCode::ConstraintError))?;
                self.state.write_fan_mode(mode)?;
            }
            FanControlAttribute::PercentSetting => {
                let percent = if data.null().is_ok() {
                    None
                } else {
                    Some(data.u8()?)
                };
                self.state.write_percent_setting(percent)?;
            }
            FanControlAttribute::FanModeSequence | FanControlAttribute::PercentCurrent => {
                return Err(ErrorCode::UnsupportedAccess.into());
            }
        }

        self.dataver.changed();
        Ok(())
    }
}

impl Handler for FanControlHandler {
    fn read(&self, ctx: impl ReadContext, reply: impl ReadReply) -> Result<(), Error> {
        self.read_impl(ctx, reply)
    }

    fn write(&self, ctx: impl WriteContext) -> Result<(), Error> {
        self.write_impl(ctx)
    }
}

impl NonBlockingHandler for FanControlHandler {}
