//! OnOff cluster (0x0006) for lights and plug-in units.
//!
//! The cluster is served by rs-matter's `OnOffHandler`, which runs the
//! Lighting feature state machine (timed on, delayed off, global scene
//! control). [`OnOffState`] is its hooks object: the handler reads and writes
//! the on/off value through it, and the device is told about controller
//! changes from `set_on_off`.

use super::{ClusterState, StateCore};
use crate::callback::Callback;
use crate::matter::notifier::ClusterNotifier;
use rs_matter::dm::Cluster;
use rs_matter::dm::clusters::decl::on_off as on_off_cluster;
use rs_matter::dm::clusters::on_off::{
    self, EffectVariantEnum, NoLevelControl, OnOffHooks, StartUpOnOffEnum,
};
use rs_matter::error::Error;
use rs_matter::tlv::Nullable;
use rs_matter::with;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Matter Cluster ID for OnOff
pub const CLUSTER_ID: u32 = 0x0006;

/// OnOff with the Lighting feature, required by both the On/Off Light and
/// the On/Off Plug-in Unit device types.
pub const CLUSTER: Cluster<'static> = on_off_cluster::FULL_CLUSTER
    .with_revision(6)
    .with_features(on_off_cluster::Feature::LIGHTING.bits())
    .with_attrs(with!(
        required;
        on_off_cluster::AttributeId::OnOff
        | on_off_cluster::AttributeId::GlobalSceneControl
        | on_off_cluster::AttributeId::OnTime
        | on_off_cluster::AttributeId::OffWaitTime
        | on_off_cluster::AttributeId::StartUpOnOff
    ))
    .with_cmds(with!(
        on_off_cluster::CommandId::Off
            | on_off_cluster::CommandId::On
            | on_off_cluster::CommandId::Toggle
            | on_off_cluster::CommandId::OffWithEffect
            | on_off_cluster::CommandId::OnWithRecallGlobalScene
            | on_off_cluster::CommandId::OnWithTimedOff
    ));

/// rs-matter's handler bound to the hooks of one endpoint.
pub type OnOffHandler<'a> = on_off::OnOffHandler<'a, &'a OnOffState, NoLevelControl>;

/// Shared on/off state of one endpoint.
pub struct OnOffState {
    on: AtomicBool,
    /// 0 = null, 1 = Off, 2 = On, 3 = Toggle
    start_up_on_off: AtomicU8,
    core: StateCore,
}

impl OnOffState {
    pub fn new(initial: bool) -> Self {
        Self {
            on: AtomicBool::new(initial),
            start_up_on_off: AtomicU8::new(0),
            core: StateCore::new(),
        }
    }

    pub fn get(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }

    /// Publish a value coming from the accessory.
    pub fn report(&self, on: bool) {
        let old = self.on.swap(on, Ordering::SeqCst);
        if old != on {
            self.core
                .changed(on_off_cluster::AttributeId::OnOff as u32);
        }
    }

    /// Apply a controller change and forward it to the device.
    pub fn command(&self, on: bool) {
        log::info!(
            "[Matter] OnOff cluster: {}",
            if on { "on" } else { "off" }
        );
        self.report(on);
        self.core.controller_changed();
    }

    fn encode_start_up(value: Option<StartUpOnOffEnum>) -> u8 {
        match value {
            None => 0,
            Some(StartUpOnOffEnum::Off) => 1,
            Some(StartUpOnOffEnum::On) => 2,
            Some(StartUpOnOffEnum::Toggle) => 3,
        }
    }

    fn decode_start_up(value: u8) -> Option<StartUpOnOffEnum> {
        match value {
            1 => Some(StartUpOnOffEnum::Off),
            2 => Some(StartUpOnOffEnum::On),
            3 => Some(StartUpOnOffEnum::Toggle),
            _ => None,
        }
    }
}

impl ClusterState for OnOffState {
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

impl OnOffHooks for OnOffState {
    const CLUSTER: Cluster<'static> = CLUSTER;

    fn on_off(&self) -> bool {
        self.get()
    }

    /// Every call comes from the handler acting on a controller command.
    fn set_on_off(&self, on: bool) {
        self.command(on);
    }

    fn start_up_on_off(&self) -> Nullable<StartUpOnOffEnum> {
        match Self::decode_start_up(self.start_up_on_off.load(Ordering::SeqCst)) {
            Some(value) => Nullable::some(value),
            None => Nullable::none(),
        }
    }

    fn set_start_up_on_off(&self, value: Nullable<StartUpOnOffEnum>) -> Result<(), Error> {
        self.start_up_on_off
            .store(Self::encode_start_up(value.into_option()), Ordering::SeqCst);
        self.core
            .changed(on_off_cluster::AttributeId::StartUpOnOff as u32);
        Ok(())
    }

    async fn handle_off_with_effect(&self, _effect: EffectVariantEnum) {
        // Relays switch off without an effect
    }
}
