//! GenericSwitch cluster handler (0x003B).
//!
//! A momentary, stateless button. Presses are detected by the accessory and
//! published as Matter events.
//!
//! ## Features Supported
//! - Momentary Switch (MS)
//! - Momentary Switch Release (MSR)
//! - Momentary Switch Long Press (MSL)
//! - Momentary Switch Multi Press (MSM), up to a double press
//!
//! ## Events
//! - LongPress (0x02)
//! - MultiPressComplete (0x06)

use super::{ClusterState, StateCore, sync_dataver_with_state};
use crate::callback::Callback;
use crate::matter::notifier::ClusterNotifier;
use parking_lot::Mutex;
use rs_matter::dm::{
    Access, Attribute, Cluster, Dataver, Handler, NonBlockingHandler, Quality, ReadContext,
    ReadReply, Reply, WriteContext,
};
use rs_matter::dm::{EventSource, MAX_PENDING_EVENTS, PendingEvent};
use rs_matter::error::{Error, ErrorCode};
use rs_matter::im::EventPriority;
use rs_matter::tlv::{TLVTag, TLVWrite};
use rs_matter::utils::storage::WriteBuf;
use rs_matter::{attribute_enum, attributes, with};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU16, AtomicU32, AtomicU64, Ordering};
use std::time::Instant;
use strum::FromRepr;

/// Matter Cluster ID for GenericSwitch
pub const CLUSTER_ID: u32 = 0x003B;

/// Cluster revision
pub const CLUSTER_REVISION: u16 = 2;

/// Presses counted by MultiPressComplete at most
pub const MULTI_PRESS_MAX: u8 = 2;

/// Feature flags for GenericSwitch
pub mod features {
    pub const MOMENTARY_SWITCH: u32 = 0x02;
    pub const MOMENTARY_SWITCH_RELEASE: u32 = 0x04;
    pub const MOMENTARY_SWITCH_LONG_PRESS: u32 = 0x08;
    pub const MOMENTARY_SWITCH_MULTI_PRESS: u32 = 0x10;
}

/// GenericSwitch event IDs
pub mod events {
    pub const LONG_PRESS: u32 = 0x02;
    pub const MULTI_PRESS_COMPLETE: u32 = 0x06;
}

/// Event payloads are one or two small context-tagged fields.
pub const EVENT_PAYLOAD_SIZE: usize = 16;

pub type EventPayload = heapless::Vec<u8, EVENT_PAYLOAD_SIZE>;

/// Event numbers are unique across the whole node and never reset.
static NEXT_EVENT_NUMBER: AtomicU64 = AtomicU64::new(1);

fn next_event_number() -> u64 {
    NEXT_EVENT_NUMBER.fetch_add(1, Ordering::SeqCst)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum GenericSwitchAttribute {
    NumberOfPositions = 0x0000,
    CurrentPosition = 0x0001,
    MultiPressMax = 0x0002,
}

attribute_enum!(GenericSwitchAttribute);

pub const CLUSTER: Cluster<'static> = Cluster {
    id: CLUSTER_ID,
    revision: CLUSTER_REVISION,
    // MS + MSR + MSL + MSM = 0x1E
    feature_map: features::MOMENTARY_SWITCH
        | features::MOMENTARY_SWITCH_RELEASE
        | features::MOMENTARY_SWITCH_LONG_PRESS
        | features::MOMENTARY_SWITCH_MULTI_PRESS,
    attributes: attributes!(
        Attribute::new(
            GenericSwitchAttribute::NumberOfPositions as _,
            Access::RV,
            Quality::FIXED
        ),
        Attribute::new(
            GenericSwitchAttribute::CurrentPosition as _,
            Access::RV,
            Quality::NONE
        ),
        Attribute::new(
            GenericSwitchAttribute::MultiPressMax as _,
            Access::RV,
            Quality::FIXED
        ),
    ),
    commands: &[],
    with_attrs: with!(all),
    with_cmds: with!(all),
};

/// An emitted switch event waiting to be reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchEvent {
    pub endpoint_id: u16,
    pub event_id: u32,
    pub event_number: u64,
    /// Milliseconds since the switch state was created
    pub timestamp_ms: u64,
    pub payload: EventPayload,
}

/// Encode `{ 0: first, 1: second }` as an anonymous TLV structure.
fn encode_payload(fields: &[u8]) -> Result<EventPayload, Error> {
    let mut buf = [0u8; EVENT_PAYLOAD_SIZE];
    let mut wb = WriteBuf::new(&mut buf);

    wb.start_struct(&TLVTag::Anonymous)?;
    for (ctx, value) in fields.iter().enumerate() {
        wb.u8(&TLVTag::Context(ctx as u8), *value)?;
    }
    wb.end_container()?;

    EventPayload::from_slice(wb.as_slice()).map_err(|_| ErrorCode::NoSpace.into())
}

/// LongPress payload: `{ NewPosition }`.
pub fn encode_long_press(new_position: u8) -> Result<EventPayload, Error> {
    encode_payload(&[new_position])
}

/// MultiPressComplete payload: `{ PreviousPosition, TotalNumberOfPressesCounted }`.
pub fn encode_multi_press_complete(
    previous_position: u8,
    total_presses: u8,
) -> Result<EventPayload, Error> {
    encode_payload(&[previous_position, total_presses])
}

/// GenericSwitch state shared between the button device and the handler.
pub struct GenericSwitchState {
    current_position: AtomicU8,
    /// Also serialises event emission, so numbers are queued in order
    pending_events: Mutex<heapless::Vec<SwitchEvent, MAX_PENDING_EVENTS>>,
    start_time: Instant,
    endpoint_id: AtomicU16,
    core: StateCore,
}

impl GenericSwitchState {
    pub fn new() -> Self {
        Self {
            current_position: AtomicU8::new(0),
            pending_events: Mutex::new(heapless::Vec::new()),
            start_time: Instant::now(),
            endpoint_id: AtomicU16::new(0),
            core: StateCore::new(),
        }
    }

    /// Set the endpoint the events are attributed to.
    pub fn set_endpoint_id(&self, endpoint_id: u16) {
        self.endpoint_id.store(endpoint_id, Ordering::SeqCst);
    }

    pub fn current_position(&self) -> u8 {
        self.current_position.load(Ordering::SeqCst)
    }

    pub fn report_current_position(&self, position: u8) {
        let old = self.current_position.swap(position, Ordering::SeqCst);
        if old != position {
            self.core
                .changed(GenericSwitchAttribute::CurrentPosition as u32);
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Queue an event. The oldest pending event is dropped when the queue is full.
    fn emit(&self, event_id: u32, payload: EventPayload) {
        {
            let mut events = self.pending_events.lock();
            let event = SwitchEvent {
                endpoint_id: self.endpoint_id.load(Ordering::SeqCst),
                event_id,
                event_number: next_event_number(),
                timestamp_ms: self.elapsed_ms(),
                payload,
            };

            if events.is_full() {
                let dropped = events.remove(0);
                log::warn!(
                    "[Matter] GenericSwitch event queue full, dropped event #{}",
                    dropped.event_number
                );
            }
            events.push(event).ok();
        }

        self.core
            .wake(GenericSwitchAttribute::CurrentPosition as u32);
    }

    pub fn emit_long_press(&self, new_position: u8) -> Result<(), Error> {
        self.emit(events::LONG_PRESS, encode_long_press(new_position)?);
        Ok(())
    }

    pub fn emit_multi_press_complete(
        &self,
        previous_position: u8,
        total_presses: u8,
    ) -> Result<(), Error> {
        self.emit(
            events::MULTI_PRESS_COMPLETE,
            encode_multi_press_complete(previous_position, total_presses)?,
        );
        Ok(())
    }

    /// Events queued and not yet taken by the stack.
    pub fn pending(&self) -> Vec<SwitchEvent> {
        self.pending_events.lock().iter().cloned().collect()
    }

    /// Move queued events into `out` while it has room, oldest first.
    ///
    /// Events that do not fit stay queued in order. Returns how many moved.
    pub fn drain_into(&self, out: &mut heapless::Vec<PendingEvent, MAX_PENDING_EVENTS>) -> usize {
        let mut events = self.pending_events.lock();

        let mut moved = 0;
        for event in events.iter() {
            if out.push(pending_event(event)).is_err() {
                break;
            }
            moved += 1;
        }

        if moved > 0 {
            *events = events.iter().skip(moved).cloned().collect();
        }
        moved
    }
}

fn pending_event(event: &SwitchEvent) -> PendingEvent {
    PendingEvent::with_payload(
        event.endpoint_id,
        CLUSTER_ID,
        event.event_id,
        event.event_number,
        EventPriority::Info,
        event.timestamp_ms,
        &event.payload,
    )
}

impl Default for GenericSwitchState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterState for GenericSwitchState {
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

impl EventSource for GenericSwitchState {
    fn take_pending_events(&self) -> heapless::Vec<PendingEvent, MAX_PENDING_EVENTS> {
        let mut events = heapless::Vec::new();
        self.drain_into(&mut events);
        events
    }

    fn has_pending_events(&self) -> bool {
        !self.pending_events.lock().is_empty()
    }
}

/// Handler for the GenericSwitch cluster attributes.
///
/// Events are not served here; the stack drains them through the
/// [`EventSource`] implementation of the shared state.
pub struct GenericSwitchHandler {
    dataver: Dataver,
    state: Arc<GenericSwitchState>,
    last_state_version: AtomicU32,
}

impl GenericSwitchHandler {
    pub const CLUSTER: Cluster<'static> = CLUSTER;

    pub fn new(dataver: Dataver, state: Arc<GenericSwitchState>) -> Self {
        Self {
            dataver,
            state,
            last_state_version: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> &Arc<GenericSwitchState> {
        &self.state
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
                GenericSwitchAttribute::NumberOfPositions => {
                    tw.u8(tag, 2)?;
                }
                GenericSwitchAttribute::CurrentPosition => {
                    tw.u8(tag, self.state.current_position())?;
                }
                GenericSwitchAttribute::MultiPressMax => {
                    tw.u8(tag, MULTI_PRESS_MAX)?;
                }
            }
        }

        writer.complete()
    }

    fn write_impl(&self, _ctx: impl WriteContext) -> Result<(), Error> {
        // Cluster is read-only
        Err(ErrorCode::UnsupportedAccess.into())
    }
}

impl Handler for GenericSwitchHandler {
    fn read(&self, ctx: impl ReadContext, reply: impl ReadReply) -> Result<(), Error> {
        self.read_impl(ctx, reply)
    }

    fn write(&self, ctx: impl WriteContext) -> Result<(), Error> {
        self.write_impl(ctx)
    }
}

impl NonBlockingHandler for GenericSwitchHandler {}
