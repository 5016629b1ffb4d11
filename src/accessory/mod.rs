//! Accessory driver interfaces.
//!
//! An accessory is the hardware-facing half of a device: the relay behind a
//! plug, the motor driving a blind, the button on a wall plate. Drivers
//! implement one of the traits below and call their registered
//! [`ReportCallback`] whenever the physical state changes, so the owning
//! device can push the new value to its Matter endpoint.

pub mod simulated;

use crate::callback::Callback;
use serde::{Deserialize, Serialize};

pub use crate::callback::CallbackSlot as ReportSlot;

pub use simulated::{SimulatedBlind, SimulatedButton, SimulatedRelay};

/// Callback fired by an accessory after its physical state changed.
pub type ReportCallback = Callback;

/// Relay-style accessory with a single power state (lights, plug-in units).
pub trait OnOffAccessory: Send + Sync {
    fn power(&self) -> bool;

    fn set_power(&self, on: bool);

    /// Make the accessory visibly identify itself (blink, click, ...).
    fn identify(&self);

    fn set_report_callback(&self, callback: ReportCallback);
}

/// Fan accessory. Only on/off is driven; speed control stays in the driver.
pub trait FanAccessory: Send + Sync {
    fn power(&self) -> bool;

    fn set_power(&self, on: bool);

    fn identify(&self);

    fn set_report_callback(&self, callback: ReportCallback);
}

/// Motorized window covering.
///
/// Positions are whole percent where 0 is fully open and 100 fully closed.
/// Motion profiles (travel time, motor direction) belong to the driver.
pub trait WindowAccessory: Send + Sync {
    fn current_position(&self) -> u16;

    fn target_position(&self) -> u16;

    fn move_to(&self, position: u16);

    fn identify(&self);

    fn set_report_callback(&self, callback: ReportCallback);
}

/// Press classification produced by a stateless button driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressType {
    SinglePress,
    DoublePress,
    LongPress,
}

/// Stateless (momentary) button.
pub trait ButtonAccessory: Send + Sync {
    /// The press detected most recently, if any.
    fn last_press_type(&self) -> Option<PressType>;

    fn set_report_callback(&self, callback: ReportCallback);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_type_serde_names() {
        let press: PressType = serde_json::from_str("\"long_press\"").unwrap();
        assert_eq!(press, PressType::LongPress);
        assert_eq!(
            serde_json::to_string(&PressType::DoublePress).unwrap(),
            "\"double_press\""
        );
    }
}
