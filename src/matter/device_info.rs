//! Device information for Matter stack.
//!
//! Builds the Basic Information and commissioning data from configuration,
//! replacing rs-matter's test defaults.

use crate::config::MatterConfig;
use rs_matter::BasicCommData;
use rs_matter::dm::clusters::basic_info::BasicInfoConfig;

/// Product and device names are limited to 32 bytes of UTF-8.
const MAX_NAME_LEN: usize = 32;

const VENDOR_NAME: &str = "Matter Accessory Bridge";
const SERIAL_NO: &str = "MAB-001";

/// Basic Information of the bridge node.
///
/// The configured device name is leaked once: rs-matter keeps the config for
/// the lifetime of the process.
pub fn basic_info(config: &MatterConfig) -> BasicInfoConfig<'static> {
    let name: &'static str = Box::leak(truncate(&config.device_name).into_boxed_str());

    BasicInfoConfig {
        vid: config.vendor_id,
        pid: config.product_id,
        hw_ver: 1,
        hw_ver_str: "1",
        sw_ver: 1,
        sw_ver_str: env!("CARGO_PKG_VERSION"),
        serial_no: SERIAL_NO,
        device_name: name,
        product_name: name,
        vendor_name: VENDOR_NAME,
        ..BasicInfoConfig::new()
    }
}

/// Commissioning discriminator and passcode.
pub fn comm_data(config: &MatterConfig) -> BasicCommData {
    BasicCommData {
        password: config.passcode,
        discriminator: config.discriminator,
    }
}

fn truncate(name: &str) -> String {
    if name.len() <= MAX_NAME_LEN {
        return name.to_string();
    }

    let mut end = MAX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_basic_info_from_config() {
        let config = Config::default();
        let info = basic_info(&config.matter);

        assert_eq!(info.vid, 0xFFF1);
        assert_eq!(info.pid, 0x8002);
        assert_eq!(info.device_name, "Matter Accessory Bridge");
        assert_eq!(info.product_name, info.device_name);
    }

    #[test]
    fn test_long_names_are_truncated() {
        let mut config = Config::default().matter;
        config.device_name = "A very long bridge name that does not fit".to_string();

        let info = basic_info(&config);
        assert_eq!(info.device_name.len(), MAX_NAME_LEN);
        assert_eq!(info.device_name, "A very long bridge name that doe");
    }

    #[test]
    fn test_multibyte_names_truncate_on_char_boundary() {
        // 30 ASCII bytes then a 3-byte character straddling the limit
        let name = format!("{}€uro", "x".repeat(30));
        assert_eq!(truncate(&name), "x".repeat(30));

        // 16 two-byte characters fill the limit exactly
        let name = "é".repeat(20);
        let truncated = truncate(&name);
        assert_eq!(truncated.len(), MAX_NAME_LEN);
        assert_eq!(truncated, "é".repeat(16));
    }

    #[test]
    fn test_short_names_are_kept() {
        assert_eq!(truncate("Hallway Bridge"), "Hallway Bridge");
    }

    #[test]
    fn test_comm_data_from_config() {
        let mut config = Config::default().matter;
        config.discriminator = 250;
        config.passcode = 123456;

        let comm = comm_data(&config);
        assert_eq!(comm.discriminator, 250);
        assert_eq!(comm.password, 123456);
    }
}
