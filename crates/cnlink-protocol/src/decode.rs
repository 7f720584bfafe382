//! Measurement payload decoding.
//!
//! Consumption packet:
//! ```text
//! [0xFF][config][count] count × ([tick u32 BE][p f32 BE]?[v f32 BE]?[c f32 BE]?)
//! ```
//! Which values are present is only known from the last acknowledged
//! consumption configuration. Ticks count 1/32768 s from the time reference.
//!
//! Radio packet:
//! ```text
//! [0xFE][count][seconds u32 LE] count × ([micros u32 LE][channel u8][rssi i8])
//! ```

use bytes::Buf;
use serde::Serialize;
use tracing::warn;

use crate::command::PowerSource;
use crate::error::DecodeError;
use crate::wire;

const CONSUMPTION_HEADER: usize = 3;
const RADIO_HEADER: usize = 6;
const RADIO_SAMPLE_LEN: usize = 6;
const TICK_LEN: usize = 4;
const VALUE_LEN: usize = 4;

/// One column of a consumption sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MeasureField {
    #[serde(rename = "t")]
    Time,
    #[serde(rename = "p")]
    Power,
    #[serde(rename = "v")]
    Voltage,
    #[serde(rename = "c")]
    Current,
}

impl MeasureField {
    pub fn name(self) -> &'static str {
        match self {
            MeasureField::Time => "t",
            MeasureField::Power => "p",
            MeasureField::Voltage => "v",
            MeasureField::Current => "c",
        }
    }
}

/// Consumption sample layout, derived from an acknowledged configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeConfig {
    /// Sample columns in wire order; always starts with `Time`.
    pub fields: Vec<MeasureField>,
    /// Bytes per sample.
    pub sample_len: usize,
    pub source: Option<PowerSource>,
    /// The acknowledged measure-flags byte.
    pub config_byte: u8,
}

impl DecodeConfig {
    /// Derive the layout from the measure-flags byte of a configuration ack.
    pub fn from_ack_byte(config_byte: u8) -> Self {
        let mut fields = vec![MeasureField::Time];
        if config_byte & wire::MEASURE_POWER != 0 {
            fields.push(MeasureField::Power);
        }
        if config_byte & wire::MEASURE_VOLTAGE != 0 {
            fields.push(MeasureField::Voltage);
        }
        if config_byte & wire::MEASURE_CURRENT != 0 {
            fields.push(MeasureField::Current);
        }
        let sample_len = TICK_LEN + VALUE_LEN * (fields.len() - 1);

        Self {
            fields,
            sample_len,
            source: PowerSource::from_flags(config_byte),
            config_byte,
        }
    }

    pub fn has(&self, field: MeasureField) -> bool {
        self.fields.contains(&field)
    }

    /// Field names, e.g. `["t", "p", "v", "c"]`.
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name()).collect()
    }
}

/// One decoded consumption sample. Values not measured are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConsumptionSample {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub power: Option<f32>,
    pub voltage: Option<f32>,
    pub current: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionMeasures {
    pub source: Option<PowerSource>,
    pub samples: Vec<ConsumptionSample>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RadioSample {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub channel: u8,
    pub rssi: i8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadioMeasures {
    pub samples: Vec<RadioSample>,
}

/// A decoded measurement packet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeasureRecord {
    Consumption(ConsumptionMeasures),
    Radio(RadioMeasures),
}

impl MeasureRecord {
    pub fn sample_count(&self) -> usize {
        match self {
            MeasureRecord::Consumption(m) => m.samples.len(),
            MeasureRecord::Radio(m) => m.samples.len(),
        }
    }
}

/// Decode a consumption packet with the given layout and time reference.
///
/// A config byte differing from the acknowledged one is logged; the
/// acknowledged layout is used regardless.
pub fn decode_consumption(
    payload: &[u8],
    config: Option<&DecodeConfig>,
    time_ref: Option<f64>,
) -> Result<ConsumptionMeasures, DecodeError> {
    if payload.len() < CONSUMPTION_HEADER {
        return Err(DecodeError::Truncated { len: payload.len() });
    }
    if payload[0] != wire::CONSUMPTION_FRAME {
        return Err(DecodeError::UnexpectedTag(payload[0]));
    }
    let config = config.ok_or(DecodeError::NotConfigured)?;

    let config_byte = payload[1];
    let count = payload[2] as usize;
    let expected = CONSUMPTION_HEADER + count * config.sample_len;
    if payload.len() != expected {
        return Err(DecodeError::LengthMismatch {
            len: payload.len(),
            expected,
        });
    }
    let time_ref = time_ref.ok_or(DecodeError::NoTimeReference)?;

    if config_byte != config.config_byte {
        warn!(
            received = config_byte,
            acknowledged = config.config_byte,
            "consumption config byte mismatch, decoding with acknowledged layout"
        );
    }

    let mut buf = &payload[CONSUMPTION_HEADER..];
    let mut samples = Vec::with_capacity(count);
    for _ in 0..count {
        let tick = buf.get_u32();
        let mut sample = ConsumptionSample {
            timestamp: time_ref + f64::from(tick) / wire::TICKS_PER_SECOND,
            power: None,
            voltage: None,
            current: None,
        };
        for field in &config.fields[1..] {
            let value = buf.get_f32();
            match field {
                MeasureField::Power => sample.power = Some(value),
                MeasureField::Voltage => sample.voltage = Some(value),
                MeasureField::Current => sample.current = Some(value),
                MeasureField::Time => {}
            }
        }
        samples.push(sample);
    }

    Ok(ConsumptionMeasures {
        source: config.source,
        samples,
    })
}

/// Decode a radio measure packet. Its timestamps are absolute.
pub fn decode_radio(payload: &[u8]) -> Result<RadioMeasures, DecodeError> {
    if payload.len() < RADIO_HEADER {
        return Err(DecodeError::Truncated { len: payload.len() });
    }
    if payload[0] != wire::RADIO_MEASURE_FRAME {
        return Err(DecodeError::UnexpectedTag(payload[0]));
    }

    let count = payload[1] as usize;
    let expected = RADIO_HEADER + count * RADIO_SAMPLE_LEN;
    if payload.len() != expected {
        return Err(DecodeError::LengthMismatch {
            len: payload.len(),
            expected,
        });
    }

    let mut buf = &payload[2..];
    let seconds = f64::from(buf.get_u32_le());
    let samples = (0..count)
        .map(|_| {
            let micros = f64::from(buf.get_u32_le());
            RadioSample {
                timestamp: seconds + micros / 1_000_000.0,
                channel: buf.get_u8(),
                rssi: buf.get_i8(),
            }
        })
        .collect();

    Ok(RadioMeasures { samples })
}
