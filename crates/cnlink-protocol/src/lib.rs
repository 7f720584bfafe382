//! Control node protocol.
//!
//! Builds command payloads and validates their answers, and decodes the
//! measurement path: acknowledgements that install the time reference and
//! the consumption schema, then the consumption and radio measures that
//! depend on them.

pub mod clock;
pub mod command;
pub mod decode;
pub mod error;
pub mod measures;
pub mod protocol;
pub mod wire;

pub use clock::{Clock, SystemClock};
pub use command::{
    Average, Command, ConsumptionConfig, Direction, Period, PowerSource, PowerSupply, RadioConfig,
    RADIO_PERIOD_MS,
};
pub use decode::{
    ConsumptionMeasures, ConsumptionSample, DecodeConfig, MeasureField, MeasureRecord,
    RadioMeasures, RadioSample,
};
pub use error::{CommandError, DecodeError, MeasuresError, Result};
pub use measures::{MeasuresReader, DEFAULT_POLL_INTERVAL};
pub use protocol::{CommandSender, Protocol};
