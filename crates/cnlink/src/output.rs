use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use cnlink_protocol::{ConsumptionMeasures, MeasureRecord, RadioMeasures};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct CommandOutput<'a> {
    command: &'a str,
    device: &'a str,
    status: &'a str,
    timestamp: u64,
}

/// Print the outcome of a successful command.
pub fn print_command_ok(command: &str, device: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = CommandOutput {
                command,
                device,
                status: "ok",
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "DEVICE", "STATUS"])
                .add_row(vec![command, device, "ok"]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{command} on {device}: ok"),
    }
}

/// Print one decoded measure record.
pub fn print_record(record: &MeasureRecord, format: OutputFormat) {
    match (format, record) {
        (OutputFormat::Json, record) => print_json(record),
        (OutputFormat::Table, MeasureRecord::Consumption(m)) => println!("{}", consumption_table(m)),
        (OutputFormat::Table, MeasureRecord::Radio(m)) => println!("{}", radio_table(m)),
        (OutputFormat::Pretty, MeasureRecord::Consumption(m)) => {
            let source = m.source.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
            for s in &m.samples {
                println!(
                    "consumption {:.6} source={} p={} v={} c={}",
                    s.timestamp,
                    source,
                    value(s.power),
                    value(s.voltage),
                    value(s.current)
                );
            }
        }
        (OutputFormat::Pretty, MeasureRecord::Radio(m)) => {
            for s in &m.samples {
                println!("radio {:.6} channel={} rssi={}", s.timestamp, s.channel, s.rssi);
            }
        }
    }
}

/// Print the serial devices found on this host.
pub fn print_ports(ports: &[String], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ports),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE"]);
            for port in ports {
                table.add_row(vec![port.as_str()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for port in ports {
                println!("{port}");
            }
        }
    }
}

fn consumption_table(measures: &ConsumptionMeasures) -> Table {
    let source = measures
        .source
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".into());
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["TIMESTAMP", "SOURCE", "POWER (W)", "VOLTAGE (V)", "CURRENT (A)"]);
    for s in &measures.samples {
        table.add_row(vec![
            format!("{:.6}", s.timestamp),
            source.clone(),
            value(s.power),
            value(s.voltage),
            value(s.current),
        ]);
    }
    table
}

fn radio_table(measures: &RadioMeasures) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["TIMESTAMP", "CHANNEL", "RSSI (dBm)"]);
    for s in &measures.samples {
        table.add_row(vec![
            format!("{:.6}", s.timestamp),
            s.channel.to_string(),
            s.rssi.to_string(),
        ]);
    }
    table
}

fn value(v: Option<f32>) -> String {
    v.map(|v| format!("{v:.6}")).unwrap_or_else(|| "-".into())
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
