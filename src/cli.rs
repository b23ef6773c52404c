// CLI definitions using clap

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "radalertlog")]
#[command(author, version, about = "Console and network logger for Radiation Alert geiger counters")]
pub struct Cli {
    /// Print decoded records as JSON lines instead of the periodic table
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log from a device over Bluetooth LE
    #[command(visible_alias = "b")]
    Ble {
        /// Device address (XX:XX:XX:XX:XX:XX); scans for a Mon200 when
        /// omitted (scanning may need root)
        address: Option<String>,
    },

    /// Log from a device over USB HID
    #[command(visible_alias = "h")]
    Hid {
        /// Vendor ID, e.g. 0x1781
        #[arg(value_parser = parse_device_id)]
        vid: Option<u16>,
        /// Product ID, e.g. 0x08E9
        #[arg(value_parser = parse_device_id)]
        pid: Option<u16>,
    },
}

/// Accept decimal or 0x-prefixed hex IDs
pub fn parse_device_id(s: &str) -> Result<u16, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|_| format!("Invalid device id: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_ids_parse_in_both_bases() {
        assert_eq!(parse_device_id("0x1781"), Ok(0x1781));
        assert_eq!(parse_device_id("6017"), Ok(6017));
        assert!(parse_device_id("0xGG").is_err());
    }
}
