use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use cnlink_protocol::{
    Average, ConsumptionConfig, Period, PowerSource, PowerSupply, RadioConfig, RADIO_PERIOD_MS,
};
use cnlink_router::{ControlNodeLink, LinkConfig};
use cnlink_transport::SerialConfig;

use crate::exit::{link_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod consumption;
pub mod monitor;
pub mod ports;
pub mod power;
pub mod radio;
pub mod reset_time;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Power the open node on.
    Start(PowerArgs),
    /// Power the open node off.
    Stop(PowerArgs),
    /// Reset the control node clock.
    ResetTime(DeviceArgs),
    /// Configure or disable consumption measures.
    Consumption(ConsumptionArgs),
    /// Configure or stop radio measures.
    Radio(RadioArgs),
    /// Reset time, configure measures and print them as they arrive.
    Monitor(MonitorArgs),
    /// List serial devices.
    Ports,
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Start(args) => power::run(args, cnlink_protocol::Direction::Start, format),
        Command::Stop(args) => power::run(args, cnlink_protocol::Direction::Stop, format),
        Command::ResetTime(args) => reset_time::run(args, format),
        Command::Consumption(args) => consumption::run(args, format),
        Command::Radio(args) => radio::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Ports => ports::run(format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Control node serial device.
    #[arg(env = "CNLINK_TTY")]
    pub tty: PathBuf,
    /// Serial baud rate.
    #[arg(long, env = "CNLINK_BAUD", default_value_t = cnlink_transport::DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// How long to wait for each answer (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
}

impl DeviceArgs {
    pub fn link_config(&self) -> CliResult<LinkConfig> {
        let timeout = parse_duration(&self.timeout)?;
        Ok(LinkConfig {
            serial: SerialConfig::default().with_baud_rate(self.baud),
            command_timeout: timeout,
        })
    }

    /// Open the link and start its reader thread.
    pub fn open(&self) -> CliResult<ControlNodeLink> {
        let config = self.link_config()?;
        ControlNodeLink::open(&self.tty, config)
            .map_err(|err| link_error(&format!("cannot open {}", self.tty.display()), err))
    }

    pub fn device(&self) -> String {
        self.tty.display().to_string()
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum SupplyArg {
    Dc,
    Battery,
}

impl From<SupplyArg> for PowerSupply {
    fn from(arg: SupplyArg) -> Self {
        match arg {
            SupplyArg::Dc => PowerSupply::Dc,
            SupplyArg::Battery => PowerSupply::Battery,
        }
    }
}

#[derive(Args, Debug)]
pub struct PowerArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Open node power supply.
    #[arg(long, value_enum, default_value = "dc")]
    pub source: SupplyArg,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum SourceArg {
    #[value(name = "3.3v")]
    V3_3,
    #[value(name = "5v")]
    V5,
    #[value(name = "batt")]
    Batt,
}

impl From<SourceArg> for PowerSource {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::V3_3 => PowerSource::V3_3,
            SourceArg::V5 => PowerSource::V5,
            SourceArg::Batt => PowerSource::Battery,
        }
    }
}

/// Consumption measure selection shared by `consumption` and `monitor`.
#[derive(Args, Debug)]
pub struct MeasureArgs {
    /// Rail to measure.
    #[arg(long, value_enum, default_value = "3.3v")]
    pub source: SourceArg,
    /// Measure power.
    #[arg(short = 'p', long)]
    pub power: bool,
    /// Measure voltage.
    #[arg(short = 'v', long)]
    pub voltage: bool,
    /// Measure current.
    #[arg(short = 'c', long)]
    pub current: bool,
    /// INA226 conversion time in microseconds.
    #[arg(long, default_value_t = 2116)]
    pub period: u32,
    /// INA226 averaging window in samples.
    #[arg(long, default_value_t = 512)]
    pub average: u32,
}

impl MeasureArgs {
    /// The requested configuration; `None` if no value is selected.
    pub fn consumption_config(&self) -> CliResult<Option<ConsumptionConfig>> {
        let period = Period::from_micros(self.period).ok_or_else(|| {
            CliError::usage(format!(
                "unsupported period {} us, expected one of {:?}",
                self.period,
                Period::supported()
            ))
        })?;
        let average = Average::from_count(self.average).ok_or_else(|| {
            CliError::usage(format!(
                "unsupported average {}, expected one of {:?}",
                self.average,
                Average::supported()
            ))
        })?;

        let config = ConsumptionConfig::new(self.source.into())
            .with_fields(self.power, self.voltage, self.current)
            .with_period(period)
            .with_average(average);
        Ok(config.is_enabled().then_some(config))
    }
}

#[derive(Args, Debug)]
pub struct ConsumptionArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    #[command(flatten)]
    pub measures: MeasureArgs,
    /// Disable consumption measures.
    #[arg(long, conflicts_with_all = ["power", "voltage", "current"])]
    pub disable: bool,
}

#[derive(Args, Debug)]
pub struct RadioArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Measure period in milliseconds (2-499).
    #[arg(long, required_unless_present = "stop")]
    pub period: Option<u16>,
    /// Stop radio measures.
    #[arg(long, conflicts_with = "period")]
    pub stop: bool,
}

impl RadioArgs {
    pub fn radio_config(&self) -> CliResult<Option<RadioConfig>> {
        radio_config(self.period)
    }
}

/// Validate a radio period before any device is opened.
pub fn radio_config(period: Option<u16>) -> CliResult<Option<RadioConfig>> {
    match period {
        None => Ok(None),
        Some(period) if RADIO_PERIOD_MS.contains(&period) => Ok(Some(RadioConfig::new(period))),
        Some(period) => Err(CliError::new(
            USAGE,
            format!(
                "radio period {period} ms outside {}..={} ms",
                RADIO_PERIOD_MS.start(),
                RADIO_PERIOD_MS.end()
            ),
        )),
    }
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    #[command(flatten)]
    pub measures: MeasureArgs,
    /// Also measure radio RSSI with this period in milliseconds.
    #[arg(long, value_name = "MS")]
    pub radio_period: Option<u16>,
    /// Exit after printing N records.
    #[arg(long)]
    pub count: Option<usize>,
    /// Exit after this long (e.g. 30s, 500ms).
    #[arg(long)]
    pub duration: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
