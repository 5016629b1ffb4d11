//! WindowCovering cluster (0x0102).
//!
//! Lift only, with the PositionAwareLift and AbsolutePosition features.
//! Positions are kept in hundredths of a percent: 0 is fully open,
//! 10000 fully closed. The absolute lift range uses the same scale.
//!
//! Motion is the accessory's job. A command only moves the target; the
//! accessory reports the current position as it travels.

use super::{ClusterState, StateCore, sync_dataver_with_state};
use crate::callback::Callback;
use crate::matter::notifier::ClusterNotifier;
use parking_lot::Mutex;
use rs_matter::dm::{
    Access, Attribute, Cluster, Command, Dataver, Handler, InvokeContext, InvokeReply,
    NonBlockingHandler, Quality, ReadContext, ReadReply, Reply, WriteContext,
};
use rs_matter::error::{Error, ErrorCode};
use rs_matter::tlv::{TLVElement, TLVWrite};
use rs_matter::{attribute_enum, attributes, command_enum, commands, with};
use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use strum::FromRepr;

/// Matter Cluster ID for WindowCovering
pub const CLUSTER_ID: u32 = 0x0102;

/// Cluster revision
pub const CLUSTER_REVISION: u16 = 5;

/// Fully closed, in hundredths of a percent
pub const FULLY_CLOSED: u16 = 10_000;

/// Feature flags for WindowCovering
pub mod features {
    pub const LIFT: u32 = 0x01;
    pub const POSITION_AWARE_LIFT: u32 = 0x04;
    pub const ABSOLUTE_POSITION: u32 = 0x08;
}

/// ConfigStatus bits
mod config_status {
    pub const OPERATIONAL: u8 = 0x01;
    pub const LIFT_POSITION_AWARE: u8 = 0x08;
}

/// Mode bits that may be written
const MODE_MASK: u8 = 0x0F;

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum WindowCoveringAttribute {
    Type = 0x0000,
    CurrentPositionLift = 0x0003,
    ConfigStatus = 0x0007,
    CurrentPositionLiftPercentage = 0x0008,
    OperationalStatus = 0x000A,
    TargetPositionLiftPercent100ths = 0x000B,
    EndProductType = 0x000D,
    CurrentPositionLiftPercent100ths = 0x000E,
    InstalledOpenLimitLift = 0x0010,
    InstalledClosedLimitLift = 0x0011,
    Mode = 0x0017,
}

attribute_enum!(WindowCoveringAttribute);

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum WindowCoveringCommand {
    UpOrOpen = 0x00,
    DownOrClose = 0x01,
    StopMotion = 0x02,
    GoToLiftValue = 0x04,
    GoToLiftPercentage = 0x05,
}

command_enum!(WindowCoveringCommand);

/// Movement direction reported in OperationalStatus.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum MovementStatus {
    Stopped = 0b00,
    Opening = 0b01,
    Closing = 0b10,
}

pub const CLUSTER: Cluster<'static> = Cluster {
    id: CLUSTER_ID,
    revision: CLUSTER_REVISION,
    feature_map: features::LIFT | features::POSITION_AWARE_LIFT | features::ABSOLUTE_POSITION,
    attributes: attributes!(
        Attribute::new(
            WindowCoveringAttribute::Type as _,
            Access::RV,
            Quality::FIXED
        ),
        Attribute::new(
            WindowCoveringAttribute::CurrentPositionLift as _,
            Access::RV,
            Quality::NULLABLE
        ),
        Attribute::new(
            WindowCoveringAttribute::ConfigStatus as _,
            Access::RV,
            Quality::NONE
        ),
        Attribute::new(
            WindowCoveringAttribute::CurrentPositionLiftPercentage as _,
            Access::RV,
            Quality::NULLABLE
        ),
        Attribute::new(
            WindowCoveringAttribute::OperationalStatus as _,
            Access::RV,
            Quality::NONE
        ),
        Attribute::new(
            WindowCoveringAttribute::TargetPositionLiftPercent100ths as _,
            Access::RV,
            Quality::NULLABLE
        ),
        Attribute::new(
            WindowCoveringAttribute::EndProductType as _,
            Access::RV,
            Quality::FIXED
        ),
        Attribute::new(
            WindowCoveringAttribute::CurrentPositionLiftPercent100ths as _,
            Access::RV,
            Quality::NULLABLE
        ),
        Attribute::new(
            WindowCoveringAttribute::InstalledOpenLimitLift as _,
            Access::RV,
            Quality::NONE
        ),
        Attribute::new(
            WindowCoveringAttribute::InstalledClosedLimitLift as _,
            Access::RV,
            Quality::NONE
        ),
        Attribute::new(
            WindowCoveringAttribute::Mode as _,
            Access::RWVM,
            Quality::NONE
        ),
    ),
    commands: commands!(
        Command::new(WindowCoveringCommand::UpOrOpen as _, None, Access::WO),
        Command::new(WindowCoveringCommand::DownOrClose as _, None, Access::WO),
        Command::new(WindowCoveringCommand::StopMotion as _, None, Access::WO),
        Command::new(WindowCoveringCommand::GoToLiftValue as _, None, Access::WO),
        Command::new(
            WindowCoveringCommand::GoToLiftPercentage as _,
            None,
            Access::WO
        ),
    ),
    with_attrs: with!(all),
    with_cmds: with!(all),
};

#[derive(Debug, Clone, Copy)]
struct LiftValues {
    current: Option<u16>,
    target: Option<u16>,
    mode: u8,
}

/// Shared lift state of one window covering endpoint.
pub struct WindowCoveringState {
    values: Mutex<LiftValues>,
    core: StateCore,
}

impl WindowCoveringState {
    /// Start fully open with both positions known.
    pub fn new() -> Self {
        Self {
            values: Mutex::new(LiftValues {
                current: Some(0),
                target: Some(0),
                mode: 0,
            }),
            core: StateCore::new(),
        }
    }

    pub fn current_percent100ths(&self) -> Option<u16> {
        self.values.lock().current
    }

    pub fn target_percent100ths(&self) -> Option<u16> {
        self.values.lock().target
    }

    pub fn mode(&self) -> u8 {
        self.values.lock().mode
    }

    pub fn movement(&self) -> MovementStatus {
        let values = self.values.lock();
        match (values.current, values.target) {
            (Some(current), Some(target)) if target < current => MovementStatus::Opening,
            (Some(current), Some(target)) if target > current => MovementStatus::Closing,
            _ => MovementStatus::Stopped,
        }
    }

    /// OperationalStatus bitmap: global bits 0-1 mirrored into lift bits 2-3.
    pub fn operational_status(&self) -> u8 {
        let movement = self.movement() as u8;
        movement | (movement << 2)
    }

    /// Publish the current position reported by the accessory.
    pub fn report_current(&self, percent100ths: u16) {
        let changed = {
            let mut values = self.values.lock();
            values.current.replace(percent100ths) != Some(percent100ths)
        };
        if changed {
            self.core
                .changed(WindowCoveringAttribute::CurrentPositionLiftPercent100ths as u32);
            self.core
                .changed(WindowCoveringAttribute::CurrentPositionLiftPercentage as u32);
            self.core
                .changed(WindowCoveringAttribute::CurrentPositionLift as u32);
            self.core
                .changed(WindowCoveringAttribute::OperationalStatus as u32);
        }
    }

    /// Publish the target position reported by the accessory.
    pub fn report_target(&self, percent100ths: u16) {
        let changed = {
            let mut values = self.values.lock();
            values.target.replace(percent100ths) != Some(percent100ths)
        };
        if changed {
            self.core
                .changed(WindowCoveringAttribute::TargetPositionLiftPercent100ths as u32);
            self.core
                .changed(WindowCoveringAttribute::OperationalStatus as u32);
        }
    }

    /// Controller asked to move to `percent100ths`.
    pub fn command_target(&self, percent100ths: u16) -> Result<(), Error> {
        if percent100ths > FULLY_CLOSED {
            return Err(ErrorCode::ConstraintError.into());
        }

        log::info!(
            "[Matter] WindowCovering: target set to {}.{:02}%",
            percent100ths / 100,
            percent100ths % 100
        );
        self.report_target(percent100ths);
        self.core.controller_changed();
        Ok(())
    }

    pub fn up_or_open(&self) -> Result<(), Error> {
        self.command_target(0)
    }

    pub fn down_or_close(&self) -> Result<(), Error> {
        self.command_target(FULLY_CLOSED)
    }

    /// Stop where the blind currently is.
    pub fn stop_motion(&self) -> Result<(), Error> {
        let current = self.current_percent100ths().unwrap_or(0);
        self.command_target(current)
    }

    pub fn write_mode(&self, mode: u8) -> Result<(), Error> {
        if mode & !MODE_MASK != 0 {
            return Err(ErrorCode::ConstraintError.into());
        }
        let changed = {
            let mut values = self.values.lock();
            std::mem::replace(&mut values.mode, mode) != mode
        };
        if changed {
            self.core.changed(WindowCoveringAttribute::Mode as u32);
        }
        Ok(())
    }
}

impl Default for WindowCoveringState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterState for WindowCoveringState {
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

/// Handler serving a [`WindowCoveringState`].
pub struct WindowCoveringHandler {
    dataver: Dataver,
    state: Arc<WindowCoveringState>,
    last_state_version: AtomicU32,
}

impl WindowCoveringHandler {
    pub const CLUSTER: Cluster<'static> = CLUSTER;

    pub fn new(dataver: Dataver, state: Arc<WindowCoveringState>) -> Self {
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

        let current = self.state.current_percent100ths();

        let tag = writer.tag();
        {
            let mut tw = writer.writer();

            match attr.attr_id.try_into()? {
                // Rollershade
                WindowCoveringAttribute::Type | WindowCoveringAttribute::EndProductType => {
                    tw.u8(tag, 0)?;
                }
                WindowCoveringAttribute::ConfigStatus => {
                    tw.u8(
                        tag,
                        config_status::OPERATIONAL | config_status::LIFT_POSITION_AWARE,
                    )?;
                }
                WindowCoveringAttribute::OperationalStatus => {
                    tw.u8(tag, self.state.operational_status())?;
                }
                WindowCoveringAttribute::CurrentPositionLift
                | WindowCoveringAttribute::CurrentPositionLiftPercent100ths => match current {
                    Some(position) => tw.u16(tag, position)?,
                    None => tw.null(tag)?,
                },
                WindowCoveringAttribute::CurrentPositionLiftPercentage => match current {
                    Some(position) => tw.u8(tag, (position / 100) as u8)?,
                    None => tw.null(tag)?,
                },
                WindowCoveringAttribute::TargetPositionLiftPercent100ths => {
                    match self.state.target_percent100ths() {
                        Some(position) => tw.u16(tag, position)?,
                        None => tw.null(tag)?,
                    }
                }
                WindowCoveringAttribute::InstalledOpenLimitLift => {
                    tw.u16(tag, 0)?;
                }
                WindowCoveringAttribute::InstalledClosedLimitLift => {
                    tw.u16(tag, FULLY_CLOSED)?;
                }
                WindowCoveringAttribute::Mode => {
                    tw.u8(tag, self.state.mode())?;
                }
            }
        }

        writer.complete()
    }

    fn write_impl(&self, ctx: impl WriteContext) -> Result<(), Error> {
        let attr = ctx.attr();
        let data = ctx.data();

        attr.check_dataver(self.dataver.get())?;

        match attr.attr_id.try_into()? {
            WindowCoveringAttribute::Mode => {
                self.state.write_mode(data.u8()?)?;
                self.dataver.changed();
                Ok(())
            }
            _ => Err(ErrorCode::UnsupportedAccess.into()),
        }
    }

    fn invoke_impl(&self, ctx: impl InvokeContext, _reply: impl InvokeReply) -> Result<(), Error> {
        let cmd = ctx.cmd();
        self.run_command(cmd.cmd_id.try_into()?, ctx.data())
    }

    fn run_command(
        &self,
        command: WindowCoveringCommand,
        data: &TLVElement<'_>,
    ) -> Result<(), Error> {
        match command {
            WindowCoveringCommand::UpOrOpen => self.state.up_or_open()?,
            WindowCoveringCommand::DownOrClose => self.state.down_or_close()?,
            WindowCoveringCommand::StopMotion => self.state.stop_motion()?,
            // Absolute lift values share the Percent100ths scale
            WindowCoveringCommand::GoToLiftValue | WindowCoveringCommand::GoToLiftPercentage => {
                let mut seq = data.structure()?;
                let position = seq.scan_ctx(0)?.u16()?;
                self.state.command_target(position)?;
            }
        }

        self.dataver.changed();
        Ok(())
    }
}

impl Handler for WindowCoveringHandler {
    fn read(&self, ctx: impl ReadContext, reply: impl ReadReply) -> Result<(), Error> {
        self.read_impl(ctx, reply)
    }

    fn write(&self, ctx: impl WriteContext) -> Result<(), Error> {
        self.write_impl(ctx)
    }

    fn invoke(&self, ctx: impl InvokeContext, reply: impl InvokeReply) -> Result<(), Error> {
        self.invoke_impl(ctx, reply)
    }
}

impl NonBlockingHandler for WindowCoveringHandler {}
