//! Dispatching handler for the device endpoints.
//!
//! One instance serves every non-root endpoint: the aggregator's descriptor
//! and, per device, Descriptor, Identify, the functional cluster and (when
//! bridged) Bridged Device Basic Information. Requests are routed by the
//! endpoint and cluster id of their path.
//!
//! OnOff endpoints are served by rs-matter's asynchronous OnOff handler, so
//! the dispatcher is an [`AsyncHandler`] and its `run` drives their Lighting
//! timers.

use super::clusters::bridged_device_basic_info::{self, BridgedClusterHandler, BridgedHandler};
use super::clusters::identify::IdentifyType;
use super::clusters::on_off as on_off_cluster;
use super::clusters::{
    ClusterState, FanControlHandler, GenericSwitchHandler, GenericSwitchState, IdentifyHandler,
    OnOffHandler, WindowCoveringHandler,
};
use super::notifier::{ChangeChannel, ClusterNotifier};
use crate::device::{Device, DeviceRegistry, EndpointState};
use log::{info, warn};
use rs_matter::dm::clusters::desc::{self, ClusterHandler as _};
use rs_matter::dm::clusters::on_off;
use rs_matter::dm::{
    AsyncHandler, Dataver, EventSource, Handler, HandlerContext, InvokeContext, InvokeReply,
    MAX_PENDING_EVENTS, PendingEvent, ReadContext, ReadReply, WriteContext,
};
use rs_matter::error::{Error, ErrorCode};
use rs_matter::utils::rand::Rand;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::Poll;

type DescAdaptor = desc::HandlerAdaptor<desc::DescHandler<'static>>;
type BridgedAdaptor = bridged_device_basic_info::HandlerAdaptor<BridgedHandler>;
type OnOffAdaptor<'a> = on_off::HandlerAsyncAdaptor<OnOffHandler<'a>>;

const BRIDGED_CLUSTER_ID: u32 = <BridgedHandler as BridgedClusterHandler>::CLUSTER.id;

/// The functional cluster handler of one endpoint.
enum FunctionalHandler<'a> {
    OnOff(OnOffAdaptor<'a>),
    FanControl(FanControlHandler),
    WindowCovering(WindowCoveringHandler),
    GenericSwitch(GenericSwitchHandler),
}

impl<'a> FunctionalHandler<'a> {
    fn new(state: &'a EndpointState, endpoint_id: u16, dataver: Dataver) -> Self {
        match state {
            EndpointState::OnOff(state) => Self::OnOff(on_off::HandlerAsyncAdaptor(
                on_off::OnOffHandler::new_standalone(dataver, endpoint_id, state.as_ref()),
            )),
            EndpointState::FanControl(state) => {
                Self::FanControl(FanControlHandler::new(dataver, state.clone()))
            }
            EndpointState::WindowCovering(state) => {
                Self::WindowCovering(WindowCoveringHandler::new(dataver, state.clone()))
            }
            EndpointState::GenericSwitch(state) => {
                Self::GenericSwitch(GenericSwitchHandler::new(dataver, state.clone()))
            }
        }
    }

    fn cluster_id(&self) -> u32 {
        match self {
            Self::OnOff(_) => on_off_cluster::CLUSTER_ID,
            Self::FanControl(_) => FanControlHandler::CLUSTER.id,
            Self::WindowCovering(_) => WindowCoveringHandler::CLUSTER.id,
            Self::GenericSwitch(_) => GenericSwitchHandler::CLUSTER.id,
        }
    }

    async fn read(&self, ctx: impl ReadContext, reply: impl ReadReply) -> Result<(), Error> {
        match self {
            Self::OnOff(handler) => AsyncHandler::read(handler, ctx, reply).await,
            Self::FanControl(handler) => Handler::read(handler, ctx, reply),
            Self::WindowCovering(handler) => Handler::read(handler, ctx, reply),
            Self::GenericSwitch(handler) => Handler::read(handler, ctx, reply),
        }
    }

    async fn write(&self, ctx: impl WriteContext) -> Result<(), Error> {
        match self {
            Self::OnOff(handler) => AsyncHandler::write(handler, ctx).await,
            Self::FanControl(handler) => Handler::write(handler, ctx),
            Self::WindowCovering(handler) => Handler::write(handler, ctx),
            Self::GenericSwitch(handler) => Handler::write(handler, ctx),
        }
    }

    async fn invoke(&self, ctx: impl InvokeContext, reply: impl InvokeReply) -> Result<(), Error> {
        match self {
            Self::OnOff(handler) => AsyncHandler::invoke(handler, ctx, reply).await,
            Self::FanControl(handler) => Handler::invoke(handler, ctx, reply),
            Self::WindowCovering(handler) => Handler::invoke(handler, ctx, reply),
            Self::GenericSwitch(handler) => Handler::invoke(handler, ctx, reply),
        }
    }
}

/// Handlers of one device endpoint.
struct DeviceHandlers<'a> {
    endpoint_id: u16,
    desc: DescAdaptor,
    identify: IdentifyHandler,
    functional: FunctionalHandler<'a>,
    bridged: Option<BridgedAdaptor>,
}

/// Which handler of an endpoint serves a cluster.
enum Route<'r, 'a> {
    Desc(&'r DescAdaptor),
    Identify(&'r IdentifyHandler),
    Functional(&'r FunctionalHandler<'a>),
    Bridged(&'r BridgedAdaptor),
}

pub struct DevicesHandler<'a> {
    aggregator: Option<(u16, DescAdaptor)>,
    devices: Vec<DeviceHandlers<'a>>,
    switches: Vec<Arc<GenericSwitchState>>,
}

impl<'a> DevicesHandler<'a> {
    /// Create handlers for every registered device.
    ///
    /// Each cluster state gets a notifier on `channel`, and each Identify
    /// handler forwards to [`Device::identify`].
    pub fn new(registry: &'a DeviceRegistry, rand: Rand, channel: &'static ChangeChannel) -> Self {
        let aggregator = registry.aggregator().map(|aggregator| {
            (
                aggregator.endpoint_id(),
                desc::DescHandler::new_aggregator(Dataver::new_rand(rand)).adapt(),
            )
        });

        let mut switches = Vec::new();
        let devices = registry
            .devices()
            .iter()
            .map(|device| {
                let endpoint = device.endpoint();
                let endpoint_id = endpoint.id();
                let state = endpoint.state();

                wire_notifier(state, endpoint_id, channel);
                if let EndpointState::GenericSwitch(switch) = state {
                    switches.push(switch.clone());
                }

                let identify =
                    IdentifyHandler::new(Dataver::new_rand(rand), identify_type(state));
                let weak: Weak<dyn Device> = Arc::downgrade(device);
                identify.set_on_identify(Arc::new(move || {
                    if let Some(device) = weak.upgrade()
                        && let Err(e) = device.identify()
                    {
                        warn!("[Matter] Identify on endpoint {} failed: {}", endpoint_id, e);
                    }
                }));

                DeviceHandlers {
                    endpoint_id,
                    desc: desc::DescHandler::new(Dataver::new_rand(rand)).adapt(),
                    identify,
                    functional: FunctionalHandler::new(
                        state,
                        endpoint_id,
                        Dataver::new_rand(rand),
                    ),
                    bridged: endpoint.bridged_info().map(|info| {
                        BridgedHandler::new(Dataver::new_rand(rand), info.clone()).adapt()
                    }),
                }
            })
            .collect::<Vec<_>>();

        info!(
            "[Matter] Serving {} device endpoints ({} with events)",
            devices.len(),
            switches.len()
        );

        Self {
            aggregator,
            devices,
            switches,
        }
    }

    fn route(&self, endpoint_id: u16, cluster_id: u32) -> Result<Route<'_, 'a>, Error> {
        if let Some((aggregator_id, aggregator_desc)) = &self.aggregator
            && *aggregator_id == endpoint_id
        {
            return if cluster_id == desc::DescHandler::CLUSTER.id {
                Ok(Route::Desc(aggregator_desc))
            } else {
                Err(ErrorCode::ClusterNotFound.into())
            };
        }

        let handlers = self
            .devices
            .iter()
            .find(|handlers| handlers.endpoint_id == endpoint_id)
            .ok_or(ErrorCode::EndpointNotFound)?;

        if cluster_id == desc::DescHandler::CLUSTER.id {
            Ok(Route::Desc(&handlers.desc))
        } else if cluster_id == IdentifyHandler::CLUSTER.id {
            Ok(Route::Identify(&handlers.identify))
        } else if cluster_id == handlers.functional.cluster_id() {
            Ok(Route::Functional(&handlers.functional))
        } else if let Some(bridged) = &handlers.bridged
            && cluster_id == BRIDGED_CLUSTER_ID
        {
            Ok(Route::Bridged(bridged))
        } else {
            Err(ErrorCode::ClusterNotFound.into())
        }
    }

    fn on_off_handlers(&self) -> impl Iterator<Item = &OnOffAdaptor<'a>> {
        self.devices
            .iter()
            .filter_map(|handlers| match &handlers.functional {
                FunctionalHandler::OnOff(handler) => Some(handler),
                _ => None,
            })
    }
}

impl AsyncHandler for DevicesHandler<'_> {
    async fn read(&self, ctx: impl ReadContext, reply: impl ReadReply) -> Result<(), Error> {
        let (endpoint_id, cluster_id) = {
            let attr = ctx.attr();
            (attr.endpoint_id, attr.cluster_id)
        };

        match self.route(endpoint_id, cluster_id)? {
            Route::Desc(handler) => Handler::read(handler, ctx, reply),
            Route::Identify(handler) => Handler::read(handler, ctx, reply),
            Route::Functional(handler) => handler.read(ctx, reply).await,
            Route::Bridged(handler) => Handler::read(handler, ctx, reply),
        }
    }

    async fn write(&self, ctx: impl WriteContext) -> Result<(), Error> {
        let (endpoint_id, cluster_id) = {
            let attr = ctx.attr();
            (attr.endpoint_id, attr.cluster_id)
        };

        match self.route(endpoint_id, cluster_id)? {
            Route::Desc(handler) => Handler::write(handler, ctx),
            Route::Identify(handler) => Handler::write(handler, ctx),
            Route::Functional(handler) => handler.write(ctx).await,
            Route::Bridged(handler) => Handler::write(handler, ctx),
        }
    }

    async fn invoke(&self, ctx: impl InvokeContext, reply: impl InvokeReply) -> Result<(), Error> {
        let (endpoint_id, cluster_id) = {
            let cmd = ctx.cmd();
            (cmd.endpoint_id, cmd.cluster_id)
        };

        match self.route(endpoint_id, cluster_id)? {
            Route::Desc(handler) => Handler::invoke(handler, ctx, reply),
            Route::Identify(handler) => Handler::invoke(handler, ctx, reply),
            Route::Functional(handler) => handler.invoke(ctx, reply).await,
            Route::Bridged(handler) => Handler::invoke(handler, ctx, reply),
        }
    }

    /// Drive the OnOff state machines until one of them fails.
    async fn run(&self, ctx: impl HandlerContext) -> Result<(), Error> {
        let mut runs: Vec<Pin<Box<dyn Future<Output = Result<(), Error>> + '_>>> = self
            .on_off_handlers()
            .map(|handler| {
                Box::pin(AsyncHandler::run(handler, &ctx))
                    as Pin<Box<dyn Future<Output = Result<(), Error>> + '_>>
            })
            .collect();

        if runs.is_empty() {
            return std::future::pending().await;
        }

        std::future::poll_fn(|cx| {
            for run in runs.iter_mut() {
                if let Poll::Ready(result) = run.as_mut().poll(cx) {
                    return Poll::Ready(result);
                }
            }
            Poll::Pending
        })
        .await
    }
}

/// Switch events of all button endpoints, oldest switch first.
///
/// Events that do not fit the remaining space stay queued on their switch
/// for the next drain.
impl EventSource for DevicesHandler<'_> {
    fn take_pending_events(&self) -> heapless::Vec<PendingEvent, MAX_PENDING_EVENTS> {
        let mut events = heapless::Vec::new();

        for switch in &self.switches {
            if events.is_full() {
                break;
            }
            switch.drain_into(&mut events);
        }

        events
    }

    fn has_pending_events(&self) -> bool {
        self.switches.iter().any(|switch| switch.has_pending_events())
    }
}

fn wire_notifier(state: &EndpointState, endpoint_id: u16, channel: &'static ChangeChannel) {
    match state {
        EndpointState::OnOff(state) => state.set_notifier(ClusterNotifier::new(
            channel,
            endpoint_id,
            on_off_cluster::CLUSTER_ID,
        )),
        EndpointState::FanControl(state) => state.set_notifier(ClusterNotifier::new(
            channel,
            endpoint_id,
            FanControlHandler::CLUSTER.id,
        )),
        EndpointState::WindowCovering(state) => state.set_notifier(ClusterNotifier::new(
            channel,
            endpoint_id,
            WindowCoveringHandler::CLUSTER.id,
        )),
        EndpointState::GenericSwitch(state) => state.set_notifier(ClusterNotifier::new(
            channel,
            endpoint_id,
            GenericSwitchHandler::CLUSTER.id,
        )),
    }
}

fn identify_type(state: &EndpointState) -> IdentifyType {
    match state {
        EndpointState::OnOff(_) => IdentifyType::LightOutput,
        EndpointState::WindowCovering(_) => IdentifyType::Actuator,
        EndpointState::FanControl(_) | EndpointState::GenericSwitch(_) => IdentifyType::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessory::PressType;
    use crate::config::{DeviceConfig, DeviceKindConfig, default_devices};
    use crate::device::SimulatedAccessory;
    use rs_matter::utils::rand::sys_rand;

    fn handler_for(registry: &DeviceRegistry) -> DevicesHandler<'_> {
        static CHANNEL: ChangeChannel = ChangeChannel::new();
        DevicesHandler::new(registry, sys_rand, &CHANNEL)
    }

    #[test]
    fn test_routes_by_endpoint_and_cluster() {
        let registry = DeviceRegistry::from_config(&default_devices(), true).unwrap();
        let handler = handler_for(&registry);

        assert!(matches!(
            handler.route(1, desc::DescHandler::CLUSTER.id),
            Ok(Route::Desc(_))
        ));
        assert!(handler.route(1, on_off_cluster::CLUSTER_ID).is_err());
        assert!(matches!(
            handler.route(2, on_off_cluster::CLUSTER_ID),
            Ok(Route::Functional(FunctionalHandler::OnOff(_)))
        ));
        assert!(matches!(
            handler.route(4, IdentifyHandler::CLUSTER.id),
            Ok(Route::Identify(_))
        ));
        assert!(matches!(
            handler.route(2, BRIDGED_CLUSTER_ID),
            Ok(Route::Bridged(_))
        ));
        // Light endpoint has no fan cluster
        assert!(handler.route(2, FanControlHandler::CLUSTER.id).is_err());
        assert!(handler.route(42, on_off_cluster::CLUSTER_ID).is_err());
    }

    #[test]
    fn test_standalone_devices_have_no_bridged_route() {
        let registry = DeviceRegistry::from_config(&default_devices(), false).unwrap();
        let handler = handler_for(&registry);

        assert!(handler.route(1, BRIDGED_CLUSTER_ID).is_err());
        assert!(matches!(
            handler.route(1, on_off_cluster::CLUSTER_ID),
            Ok(Route::Functional(_))
        ));
    }

    #[test]
    fn test_identify_reaches_accessory() {
        let lamp = DeviceConfig::new("Lamp", DeviceKindConfig::Light);
        let registry = DeviceRegistry::from_config(&[lamp], true).unwrap();
        let handler = handler_for(&registry);

        let Some(SimulatedAccessory::Relay(relay)) = registry.simulated().first() else {
            panic!("expected a relay");
        };

        let Ok(Route::Identify(identify)) = handler.route(2, IdentifyHandler::CLUSTER.id) else {
            panic!("expected identify route");
        };
        identify.start(5);
        assert_eq!(relay.identify_count(), 1);
    }

    #[test]
    fn test_events_drain_across_switches() {
        let configs = [
            DeviceConfig::new("Left", DeviceKindConfig::Button),
            DeviceConfig::new("Right", DeviceKindConfig::Button),
        ];
        let registry = DeviceRegistry::from_config(&configs, true).unwrap();
        let handler = handler_for(&registry);
        assert!(!handler.has_pending_events());

        for accessory in registry.simulated() {
            if let SimulatedAccessory::Button(button) = accessory {
                button.press(PressType::SinglePress);
            }
        }
        assert!(handler.has_pending_events());

        let events = handler.take_pending_events();
        assert_eq!(events.len(), 2);
        assert!(!handler.has_pending_events());
    }

    #[test]
    fn test_event_overflow_stays_queued() {
        let configs = [
            DeviceConfig::new("Left", DeviceKindConfig::Button),
            DeviceConfig::new("Right", DeviceKindConfig::Button),
        ];
        let registry = DeviceRegistry::from_config(&configs, true).unwrap();
        let handler = handler_for(&registry);

        let buttons: Vec<_> = registry
            .simulated()
            .iter()
            .filter_map(|accessory| match accessory {
                SimulatedAccessory::Button(button) => Some(button.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(buttons.len(), 2);

        for _ in 0..MAX_PENDING_EVENTS {
            buttons[0].press(PressType::SinglePress);
        }
        buttons[1].press(PressType::SinglePress);

        let first = handler.take_pending_events();
        assert_eq!(first.len(), MAX_PENDING_EVENTS);
        assert!(handler.has_pending_events());

        let second = handler.take_pending_events();
        assert_eq!(second.len(), 1);
        assert!(!handler.has_pending_events());
    }
}
