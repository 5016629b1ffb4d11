//! Cluster change notifier for live Matter subscription updates.
//!
//! Cluster states change on accessory threads. They queue the changed
//! attribute path on a static channel; the Matter thread drains it and tells
//! the subscription manager to re-evaluate.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

/// Capacity of the change queue. Overflow drops paths; any drained path
/// already marks every subscription dirty.
pub const CHANGE_QUEUE_DEPTH: usize = 32;

/// Attribute path whose value changed outside the Matter thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangedAttribute {
    pub endpoint_id: u16,
    pub cluster_id: u32,
    pub attr_id: u32,
}

pub type ChangeChannel = Channel<CriticalSectionRawMutex, ChangedAttribute, CHANGE_QUEUE_DEPTH>;

/// Notifies Matter subscriptions when a cluster's data changes.
///
/// One notifier is attached to each cluster state during stack setup.
#[derive(Clone)]
pub struct ClusterNotifier {
    channel: &'static ChangeChannel,
    endpoint_id: u16,
    cluster_id: u32,
}

impl ClusterNotifier {
    pub fn new(channel: &'static ChangeChannel, endpoint_id: u16, cluster_id: u32) -> Self {
        Self {
            channel,
            endpoint_id,
            cluster_id,
        }
    }

    pub fn endpoint_id(&self) -> u16 {
        self.endpoint_id
    }

    pub fn cluster_id(&self) -> u32 {
        self.cluster_id
    }

    /// Queue a change of `attr_id`. Never blocks.
    pub fn notify(&self, attr_id: u32) {
        let changed = ChangedAttribute {
            endpoint_id: self.endpoint_id,
            cluster_id: self.cluster_id,
            attr_id,
        };
        if self.channel.try_send(changed).is_err() {
            log::debug!(
                "[Matter] change queue full, dropped {}/0x{:04X}/0x{:04X}",
                self.endpoint_id,
                self.cluster_id,
                attr_id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_queues_attribute_path() {
        static CHANNEL: ChangeChannel = Channel::new();
        let notifier = ClusterNotifier::new(&CHANNEL, 3, 0x0006);

        notifier.notify(0x0000);

        let changed = CHANNEL.try_receive().unwrap();
        assert_eq!(
            changed,
            ChangedAttribute {
                endpoint_id: 3,
                cluster_id: 0x0006,
                attr_id: 0x0000,
            }
        );
        assert!(CHANNEL.try_receive().is_err());
    }

    #[test]
    fn test_notify_drops_when_full() {
        static CHANNEL: ChangeChannel = Channel::new();
        let notifier = ClusterNotifier::new(&CHANNEL, 2, 0x0202);

        for _ in 0..CHANGE_QUEUE_DEPTH + 5 {
            notifier.notify(0x0003);
        }

        let mut drained = 0;
        while CHANNEL.try_receive().is_ok() {
            drained += 1;
        }
        assert_eq!(drained, CHANGE_QUEUE_DEPTH);
    }
}
