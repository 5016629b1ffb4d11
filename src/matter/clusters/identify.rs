//! Identify cluster (0x0003).
//!
//! Starting an identify period forwards to the device, which asks its
//! accessory to make itself noticeable. IdentifyTime counts down on read.

use crate::callback::{Callback, CallbackSlot};
use parking_lot::Mutex;
use rs_matter::dm::{
    Access, Attribute, Cluster, Command, Dataver, Handler, InvokeContext, InvokeReply,
    NonBlockingHandler, Quality, ReadContext, ReadReply, Reply, WriteContext,
};
use rs_matter::error::{Error, ErrorCode};
use rs_matter::tlv::{TLVElement, TLVWrite};
use rs_matter::{attribute_enum, attributes, command_enum, commands, with};
use std::time::Instant;
use strum::FromRepr;

/// Matter Cluster ID for Identify
pub const CLUSTER_ID: u32 = 0x0003;

/// Cluster revision
pub const CLUSTER_REVISION: u16 = 4;

/// IdentifyTypeEnum values
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum IdentifyType {
    None = 0,
    LightOutput = 1,
    VisibleIndicator = 2,
    AudibleBeep = 3,
    Display = 4,
    Actuator = 5,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum IdentifyAttribute {
    IdentifyTime = 0x0000,
    IdentifyType = 0x0001,
}

attribute_enum!(IdentifyAttribute);

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum IdentifyCommand {
    Identify = 0x00,
}

command_enum!(IdentifyCommand);

pub const CLUSTER: Cluster<'static> = Cluster {
    id: CLUSTER_ID,
    revision: CLUSTER_REVISION,
    feature_map: 0,
    attributes: attributes!(
        Attribute::new(
            IdentifyAttribute::IdentifyTime as _,
            Access::RWVM,
            Quality::NONE
        ),
        Attribute::new(
            IdentifyAttribute::IdentifyType as _,
            Access::RV,
            Quality::FIXED
        ),
    ),
    commands: commands!(Command::new(
        IdentifyCommand::Identify as _,
        None,
        Access::WO
    ),),
    with_attrs: with!(all),
    with_cmds: with!(all),
};

/// Handler for the Identify cluster of one endpoint.
pub struct IdentifyHandler {
    dataver: Dataver,
    identify_type: IdentifyType,
    /// Requested duration and when it started
    period: Mutex<Option<(u16, Instant)>>,
    on_identify: CallbackSlot,
}

impl IdentifyHandler {
    pub const CLUSTER: Cluster<'static> = CLUSTER;

    pub fn new(dataver: Dataver, identify_type: IdentifyType) -> Self {
        Self {
            dataver,
            identify_type,
            period: Mutex::new(None),
            on_identify: CallbackSlot::new(),
        }
    }

    /// Register what runs when an identify period starts.
    pub fn set_on_identify(&self, callback: Callback) {
        self.on_identify.set(callback);
    }

    /// Seconds left in the current identify period.
    pub fn remaining(&self) -> u16 {
        match *self.period.lock() {
            Some((secs, started)) => {
                let elapsed = started.elapsed().as_secs().min(u16::MAX as u64) as u16;
                secs.saturating_sub(elapsed)
            }
            None => 0,
        }
    }

    /// Start (or with 0, cancel) an identify period.
    pub fn start(&self, secs: u16) {
        *self.period.lock() = if secs > 0 {
            Some((secs, Instant::now()))
        } else {
            None
        };
        self.dataver.changed();

        if secs > 0 {
            log::info!("[Matter] Identify for {}s", secs);
            self.on_identify.fire();
        }
    }

    fn read_impl(&self, ctx: impl ReadContext, reply: impl ReadReply) -> Result<(), Error> {
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
                IdentifyAttribute::IdentifyTime => tw.u16(tag, self.remaining())?,
                IdentifyAttribute::IdentifyType => tw.u8(tag, self.identify_type as u8)?,
            }
        }

        writer.complete()
    }

    fn write_impl(&self, ctx: impl WriteContext) -> Result<(), Error> {
        let attr = ctx.attr();
        let data = ctx.data();

        attr.check_dataver(self.dataver.get())?;

        match attr.attr_id.try_into()? {
            IdentifyAttribute::IdentifyTime => {
                self.start(data.u16()?);
                Ok(())
            }
            IdentifyAttribute::IdentifyType => Err(ErrorCode::UnsupportedAccess.into()),
        }
    }

    fn invoke_impl(&self, ctx: impl InvokeContext, _reply: impl InvokeReply) -> Result<(), Error> {
        let cmd = ctx.cmd();
        self.run_command(cmd.cmd_id.try_into()?, ctx.data())
    }

    fn run_command(&self, command: IdentifyCommand, data: &TLVElement<'_>) -> Result<(), Error> {
        match command {
            IdentifyCommand::Identify => {
                let mut seq = data.structure()?;
                let secs = seq.scan_ctx(0)?.u16()?;
                self.start(secs);
            }
        }

        Ok(())
    }
}

impl Handler for IdentifyHandler {
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

impl NonBlockingHandler for IdentifyHandler {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn handler() -> (IdentifyHandler, Arc<AtomicUsize>) {
        let handler = IdentifyHandler::new(Dataver::new(0), IdentifyType::VisibleIndicator);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        handler.set_on_identify(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        (handler, fired)
    }

    #[test]
    fn test_start_fires_callback() {
        let (handler, fired) = handler();
        handler.start(10);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(handler.remaining() > 0 && handler.remaining() <= 10);
    }

    #[test]
    fn test_zero_cancels_without_callback() {
        let (handler, fired) = handler();
        handler.start(5);
        handler.start(0);
        assert_eq!(handler.remaining(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_identify_command_starts_period() {
        let (handler, fired) = handler();

        // { 0: 5u8 }
        let fields = [0x15, 0x24, 0x00, 0x05, 0x18];
        handler
            .run_command(IdentifyCommand::Identify, &TLVElement::new(&fields))
            .unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(handler.remaining() > 0 && handler.remaining() <= 5);
    }

    #[test]
    fn test_identify_command_without_time() {
        let (handler, fired) = handler();

        assert!(
            handler
                .run_command(IdentifyCommand::Identify, &TLVElement::new(&[0x15, 0x18]))
                .is_err()
        );
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_idle_has_no_remaining_time() {
        let (handler, _) = handler();
        assert_eq!(handler.remaining(), 0);
    }
}
