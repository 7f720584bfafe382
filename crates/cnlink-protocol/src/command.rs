use std::fmt;

use serde::Serialize;

use crate::error::{CommandError, Result};
use crate::wire;

/// Open node power switch direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Start,
    Stop,
}

impl Direction {
    pub fn tag(self) -> u8 {
        match self {
            Direction::Start => wire::OPEN_NODE_START,
            Direction::Stop => wire::OPEN_NODE_STOP,
        }
    }
}

/// Power supply used for the open node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSupply {
    Battery,
    Dc,
}

impl PowerSupply {
    pub fn arg(self) -> u8 {
        match self {
            PowerSupply::Battery => wire::SUPPLY_BATTERY,
            PowerSupply::Dc => wire::SUPPLY_DC,
        }
    }
}

/// Rail whose consumption is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PowerSource {
    #[serde(rename = "3.3V")]
    V3_3,
    #[serde(rename = "5V")]
    V5,
    #[serde(rename = "BATT")]
    Battery,
}

impl PowerSource {
    pub fn flag(self) -> u8 {
        match self {
            PowerSource::V3_3 => wire::SOURCE_3_3V,
            PowerSource::V5 => wire::SOURCE_5V,
            PowerSource::Battery => wire::SOURCE_BATTERY,
        }
    }

    /// Source selected by a measure-flags byte. `None` unless exactly one
    /// source bit is set.
    pub fn from_flags(flags: u8) -> Option<Self> {
        match flags & wire::SOURCE_MASK {
            wire::SOURCE_3_3V => Some(PowerSource::V3_3),
            wire::SOURCE_5V => Some(PowerSource::V5),
            wire::SOURCE_BATTERY => Some(PowerSource::Battery),
            _ => None,
        }
    }
}

impl fmt::Display for PowerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PowerSource::V3_3 => "3.3V",
            PowerSource::V5 => "5V",
            PowerSource::Battery => "BATT",
        };
        f.write_str(name)
    }
}

const PERIODS_US: [u32; 8] = [140, 204, 332, 588, 1100, 2116, 4156, 8244];
const AVERAGES: [u32; 8] = [1, 4, 16, 64, 128, 256, 512, 1024];

/// INA226 conversion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period(u8);

impl Period {
    /// Look up the conversion time in microseconds.
    pub fn from_micros(us: u32) -> Option<Self> {
        PERIODS_US.iter().position(|&p| p == us).map(|i| Period(i as u8))
    }

    pub fn micros(self) -> u32 {
        PERIODS_US[self.0 as usize]
    }

    pub fn supported() -> &'static [u32] {
        &PERIODS_US
    }

    fn bits(self) -> u8 {
        self.0
    }
}

impl Default for Period {
    fn default() -> Self {
        Period(5)
    }
}

/// INA226 averaging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Average(u8);

impl Average {
    /// Look up the averaging window by sample count.
    pub fn from_count(count: u32) -> Option<Self> {
        AVERAGES.iter().position(|&a| a == count).map(|i| Average(i as u8))
    }

    pub fn count(self) -> u32 {
        AVERAGES[self.0 as usize]
    }

    pub fn supported() -> &'static [u32] {
        &AVERAGES
    }

    fn bits(self) -> u8 {
        self.0 << wire::AVERAGE_SHIFT
    }
}

impl Default for Average {
    fn default() -> Self {
        Average(6)
    }
}

/// Consumption measure configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumptionConfig {
    pub source: PowerSource,
    pub power: bool,
    pub voltage: bool,
    pub current: bool,
    pub period: Period,
    pub average: Average,
}

impl Default for ConsumptionConfig {
    fn default() -> Self {
        Self {
            source: PowerSource::V3_3,
            power: false,
            voltage: false,
            current: false,
            period: Period::default(),
            average: Average::default(),
        }
    }
}

impl ConsumptionConfig {
    pub fn new(source: PowerSource) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    pub fn with_fields(mut self, power: bool, voltage: bool, current: bool) -> Self {
        self.power = power;
        self.voltage = voltage;
        self.current = current;
        self
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }

    pub fn with_average(mut self, average: Average) -> Self {
        self.average = average;
        self
    }

    /// True if at least one value is measured.
    pub fn is_enabled(&self) -> bool {
        self.power || self.voltage || self.current
    }

    /// Measure flags: selected values plus the rail.
    pub fn measure_flags(&self) -> u8 {
        let mut flags = self.source.flag();
        if self.power {
            flags |= wire::MEASURE_POWER;
        }
        if self.voltage {
            flags |= wire::MEASURE_VOLTAGE;
        }
        if self.current {
            flags |= wire::MEASURE_CURRENT;
        }
        flags
    }

    /// INA226 configuration byte with the enable bit set.
    pub fn config_byte(&self) -> u8 {
        self.period.bits() | self.average.bits() | wire::CONSUMPTION_ENABLE
    }
}

/// Smallest and largest radio measure period, in milliseconds.
pub const RADIO_PERIOD_MS: std::ops::RangeInclusive<u16> = 2..=499;

/// Radio measure configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioConfig {
    pub period_ms: u16,
}

impl RadioConfig {
    pub fn new(period_ms: u16) -> Self {
        Self { period_ms }
    }
}

/// A command sent to the control node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartStop {
        direction: Direction,
        supply: PowerSupply,
    },
    ResetTime,
    ConfigureConsumption(Option<ConsumptionConfig>),
    ConfigureRadio(Option<RadioConfig>),
}

impl Command {
    pub fn tag(&self) -> u8 {
        match self {
            Command::StartStop { direction, .. } => direction.tag(),
            Command::ResetTime => wire::RESET_TIME,
            Command::ConfigureConsumption(_) => wire::CONFIG_CONSUMPTION,
            Command::ConfigureRadio(_) => wire::CONFIG_RADIO_MEASURE,
        }
    }

    pub fn name(&self) -> &'static str {
        wire::command_name(self.tag())
    }

    /// Encode the command payload (without framing).
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = match self {
            Command::StartStop { direction, supply } => vec![direction.tag(), supply.arg()],
            Command::ResetTime => vec![wire::RESET_TIME],
            Command::ConfigureConsumption(Some(config)) if config.is_enabled() => vec![
                wire::CONFIG_CONSUMPTION,
                config.measure_flags(),
                config.config_byte(),
            ],
            Command::ConfigureConsumption(_) => vec![wire::CONFIG_CONSUMPTION, 0x00, 0x00],
            Command::ConfigureRadio(Some(radio)) => {
                if !RADIO_PERIOD_MS.contains(&radio.period_ms) {
                    return Err(CommandError::InvalidArgument(format!(
                        "radio period {} ms outside {}..={} ms",
                        radio.period_ms,
                        RADIO_PERIOD_MS.start(),
                        RADIO_PERIOD_MS.end()
                    )));
                }
                let [lo, hi] = radio.period_ms.to_le_bytes();
                vec![wire::CONFIG_RADIO_MEASURE, wire::RADIO_START, lo, hi]
            }
            Command::ConfigureRadio(None) => {
                vec![wire::CONFIG_RADIO_MEASURE, wire::RADIO_STOP, 0x00, 0x00]
            }
        };
        Ok(payload)
    }
}
