//! Protocol constants as they appear on the wire.

// Commands
pub const OPEN_NODE_START: u8 = 0x70;
pub const OPEN_NODE_STOP: u8 = 0x71;
pub const RESET_TIME: u8 = 0x72;
pub const CONFIG_RADIO_MEASURE: u8 = 0x75;
pub const CONFIG_CONSUMPTION: u8 = 0x79;

// Measurement path
pub const ACK_FRAME: u8 = 0xFA;
pub const RADIO_MEASURE_FRAME: u8 = 0xFE;
pub const CONSUMPTION_FRAME: u8 = 0xFF;

// Answer status
pub const ACK: u8 = 0x0A;
pub const NACK: u8 = 0x02;

// Open node power supply
pub const SUPPLY_BATTERY: u8 = 0x00;
pub const SUPPLY_DC: u8 = 0x01;

// Consumption measure flags
pub const MEASURE_POWER: u8 = 1 << 0;
pub const MEASURE_VOLTAGE: u8 = 1 << 1;
pub const MEASURE_CURRENT: u8 = 1 << 2;
pub const SOURCE_3_3V: u8 = 1 << 4;
pub const SOURCE_5V: u8 = 1 << 5;
pub const SOURCE_BATTERY: u8 = 1 << 6;
pub const SOURCE_MASK: u8 = 0x70;

// INA226 configuration byte
pub const PERIOD_MASK: u8 = 0x07;
pub const AVERAGE_SHIFT: u8 = 4;
pub const AVERAGE_MASK: u8 = 0x70;
pub const CONSUMPTION_ENABLE: u8 = 1 << 7;

// Radio measure state
pub const RADIO_STOP: u8 = 0x00;
pub const RADIO_START: u8 = 0x01;

/// Device tick counters run at 32768 Hz.
pub const TICKS_PER_SECOND: f64 = 32768.0;

/// Name of a command tag, for logs.
pub fn command_name(tag: u8) -> &'static str {
    match tag {
        OPEN_NODE_START => "open_node_start",
        OPEN_NODE_STOP => "open_node_stop",
        RESET_TIME => "reset_time",
        CONFIG_RADIO_MEASURE => "config_radio_measure",
        CONFIG_CONSUMPTION => "config_consumption",
        _ => "unknown",
    }
}
