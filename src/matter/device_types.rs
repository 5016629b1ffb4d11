//! Device type definitions for the accessory bridge.
//!
//! IDs and revisions follow the Matter Device Library.

use rs_matter::dm::DeviceType;

/// Matter On/Off Light device type
///
/// Device Type ID: 0x0100 (256 decimal)
/// Device Type Revision: 3
///
/// Required clusters:
/// - Identify (0x0003)
/// - OnOff (0x0006)
/// - Descriptor (standard)
pub const DEV_TYPE_ON_OFF_LIGHT: DeviceType = DeviceType {
    dtype: 0x0100,
    drev: 3,
};

/// Matter On/Off Plug-in Unit device type
///
/// Device Type ID: 0x010A (266 decimal)
/// Device Type Revision: 3
///
/// Required clusters:
/// - Identify (0x0003)
/// - OnOff (0x0006)
/// - Descriptor (standard)
pub const DEV_TYPE_ON_OFF_PLUG_IN_UNIT: DeviceType = DeviceType {
    dtype: 0x010A,
    drev: 3,
};

/// Matter Fan device type
///
/// Device Type ID: 0x002B (43 decimal)
/// Device Type Revision: 2
///
/// Required clusters:
/// - Identify (0x0003)
/// - FanControl (0x0202)
/// - Descriptor (standard)
pub const DEV_TYPE_FAN: DeviceType = DeviceType {
    dtype: 0x002B,
    drev: 2,
};

/// Matter Window Covering device type
///
/// Device Type ID: 0x0202 (514 decimal)
/// Device Type Revision: 3
///
/// Required clusters:
/// - Identify (0x0003)
/// - WindowCovering (0x0102)
/// - Descriptor (standard)
pub const DEV_TYPE_WINDOW_COVERING: DeviceType = DeviceType {
    dtype: 0x0202,
    drev: 3,
};

/// Matter Generic Switch device type
///
/// Device Type ID: 0x000F (15 decimal)
/// Device Type Revision: 3
///
/// Required clusters:
/// - Identify (0x0003)
/// - Switch (0x003B)
/// - Descriptor (standard)
pub const DEV_TYPE_GENERIC_SWITCH: DeviceType = DeviceType {
    dtype: 0x000F,
    drev: 3,
};

/// Matter Aggregator device type
///
/// Device Type ID: 0x000E (14 decimal)
/// Device Type Revision: 1
///
/// Parent of every bridged node. Its Descriptor PartsList names them.
pub const DEV_TYPE_AGGREGATOR: DeviceType = DeviceType {
    dtype: 0x000E,
    drev: 1,
};

/// Matter Bridged Node device type
///
/// Device Type ID: 0x0013 (19 decimal)
/// Device Type Revision: 2
///
/// Added next to the functional device type on every bridged endpoint.
///
/// Required clusters:
/// - BridgedDeviceBasicInformation (0x0039)
/// - Descriptor (standard)
pub const DEV_TYPE_BRIDGED_NODE: DeviceType = DeviceType {
    dtype: 0x0013,
    drev: 2,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_type_ids() {
        assert_eq!(DEV_TYPE_ON_OFF_LIGHT.dtype, 0x0100);
        assert_eq!(DEV_TYPE_ON_OFF_PLUG_IN_UNIT.dtype, 0x010A);
        assert_eq!(DEV_TYPE_FAN.dtype, 0x002B);
        assert_eq!(DEV_TYPE_WINDOW_COVERING.dtype, 0x0202);
        assert_eq!(DEV_TYPE_GENERIC_SWITCH.dtype, 0x000F);
        assert_eq!(DEV_TYPE_AGGREGATOR.dtype, 0x000E);
        assert_eq!(DEV_TYPE_BRIDGED_NODE.dtype, 0x0013);
    }
}
