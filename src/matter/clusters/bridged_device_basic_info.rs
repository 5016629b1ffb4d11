//! BridgedDeviceBasicInformation Cluster (0x0039) handler.
//!
//! Present on every endpoint bridged through the aggregator. Controllers
//! read NodeLabel to name the bridged device.

use rs_matter::dm::{Cluster, Dataver, ReadContext};
use rs_matter::error::Error;
use rs_matter::tlv::{TLVBuilderParent, Utf8StrBuilder};
use rs_matter::with;
use std::sync::Arc;

rs_matter::import!(BridgedDeviceBasicInformation);

pub use bridged_device_basic_information::ClusterHandler as BridgedClusterHandler;
pub use bridged_device_basic_information::HandlerAdaptor;

/// Longest accepted node label, in bytes
pub const MAX_NODE_LABEL_LEN: usize = 63;

/// Cluster served when the device has no usable name.
pub const UNLABELLED_CLUSTER: Cluster<'static> = bridged_device_basic_information::FULL_CLUSTER
    .with_features(0)
    .with_attrs(with!(required))
    .with_cmds(with!());

/// What a bridged endpoint tells controllers about itself.
///
/// Reachability is fixed when the device is created.
#[derive(Debug)]
pub struct BridgedInfo {
    label: Option<String>,
    reachable: bool,
}

impl BridgedInfo {
    pub fn new(label: Option<String>, reachable: bool) -> Self {
        Self { label, reachable }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn reachable(&self) -> bool {
        self.reachable
    }
}

/// Handler for BridgedDeviceBasicInformation cluster.
#[derive(Clone, Debug)]
pub struct BridgedHandler {
    dataver: Dataver,
    info: Arc<BridgedInfo>,
}

impl BridgedHandler {
    pub fn new(dataver: Dataver, info: Arc<BridgedInfo>) -> Self {
        Self { dataver, info }
    }

    /// Adapt this handler for use in the data model chain
    pub const fn adapt(self) -> HandlerAdaptor<Self> {
        bridged_device_basic_information::HandlerAdaptor(self)
    }

    /// Cluster metadata matching the endpoint's label.
    pub fn cluster_for(info: &BridgedInfo) -> Cluster<'static> {
        if info.label().is_some() {
            <Self as BridgedClusterHandler>::CLUSTER
        } else {
            UNLABELLED_CLUSTER
        }
    }
}

impl BridgedClusterHandler for BridgedHandler {
    /// Required attributes plus NodeLabel
    const CLUSTER: Cluster<'static> = bridged_device_basic_information::FULL_CLUSTER
        .with_features(0)
        .with_attrs(with!(required; bridged_device_basic_information::AttributeId::NodeLabel))
        .with_cmds(with!());

    fn dataver(&self) -> u32 {
        self.dataver.get()
    }

    fn dataver_changed(&self) {
        self.dataver.changed();
    }

    fn reachable(&self, _ctx: impl ReadContext) -> Result<bool, Error> {
        Ok(self.info.reachable())
    }

    fn node_label<P: TLVBuilderParent>(
        &self,
        _ctx: impl ReadContext,
        out: Utf8StrBuilder<P>,
    ) -> Result<P, Error> {
        out.set(self.info.label().unwrap_or(""))
    }
}
