use std::sync::Arc;

use cnlink_frame::Frame;
use cnlink_router::ControlNodeLink;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::command::{Command, ConsumptionConfig, Direction, PowerSupply, RadioConfig};
use crate::decode::{self, ConsumptionMeasures, DecodeConfig, MeasureRecord};
use crate::error::{CommandError, DecodeError, Result};
use crate::wire;

/// Sends a command payload and returns the control node's answer, if any.
pub trait CommandSender: Send + Sync {
    fn send_command(&self, payload: &[u8]) -> Option<Frame>;
}

impl CommandSender for ControlNodeLink {
    fn send_command(&self, payload: &[u8]) -> Option<Frame> {
        ControlNodeLink::send_command(self, payload)
    }
}

impl<T: CommandSender + ?Sized> CommandSender for Arc<T> {
    fn send_command(&self, payload: &[u8]) -> Option<Frame> {
        (**self).send_command(payload)
    }
}

#[derive(Debug, Default)]
struct DecodeState {
    config: Option<DecodeConfig>,
    time_ref: Option<f64>,
    /// Wall-clock time of the last reset-time request not yet acknowledged.
    pending_time: Option<f64>,
}

/// Control node command and measure protocol.
///
/// Commands may be issued from any thread. The consumption layout and the
/// time reference change only when their acknowledgements are decoded.
pub struct Protocol<S, C = SystemClock> {
    sender: S,
    clock: C,
    state: Mutex<DecodeState>,
}

impl<S: CommandSender> Protocol<S> {
    pub fn new(sender: S) -> Self {
        Self::with_clock(sender, SystemClock)
    }
}

impl<S: CommandSender, C: Clock> Protocol<S, C> {
    pub fn with_clock(sender: S, clock: C) -> Self {
        Self {
            sender,
            clock,
            state: Mutex::new(DecodeState::default()),
        }
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// Power the open node on or off.
    pub fn start_stop(&self, direction: Direction, supply: PowerSupply) -> Result<()> {
        self.send(&Command::StartStop { direction, supply })
    }

    /// Reset the control node clock.
    ///
    /// The time reference is installed when the matching ack shows up on
    /// the measurement path, not when this returns.
    /// A refused request is forgotten; after a timeout it stays pending
    /// since the ack may still arrive late.
    pub fn reset_time(&self) -> Result<()> {
        self.state.lock().pending_time = Some(self.clock.now());
        let result = self.send(&Command::ResetTime);
        if let Err(CommandError::Nack { .. } | CommandError::AckMismatch { .. }) = result {
            self.state.lock().pending_time = None;
        }
        result
    }

    /// Configure consumption measures. `None` or no selected value disables them.
    pub fn configure_consumption(&self, config: Option<&ConsumptionConfig>) -> Result<()> {
        self.send(&Command::ConfigureConsumption(config.copied()))
    }

    /// Configure radio measures. `None` stops them.
    pub fn configure_radio(&self, config: Option<&RadioConfig>) -> Result<()> {
        self.send(&Command::ConfigureRadio(config.copied()))
    }

    /// Send a command and check the answer is `[tag, ACK]`.
    pub fn send(&self, command: &Command) -> Result<()> {
        let payload = command.encode()?;
        let name = command.name();
        debug!(command = name, payload = ?payload, "sending command");

        let Some(answer) = self.sender.send_command(&payload) else {
            error!(command = name, "command timed out");
            return Err(CommandError::Timeout { command: name });
        };

        match answer.payload.as_ref() {
            [tag, wire::ACK, ..] if *tag == command.tag() => Ok(()),
            [tag, wire::NACK, ..] if *tag == command.tag() => {
                error!(command = name, answer = ?answer.payload.as_ref(), "command refused");
                Err(CommandError::Nack { command: name })
            }
            other => {
                error!(command = name, answer = ?other, "unexpected answer");
                Err(CommandError::AckMismatch {
                    command: name,
                    answer: other.to_vec(),
                })
            }
        }
    }

    /// Decode one packet from the measurement queue.
    ///
    /// Acks update the decoder state and yield `None`, as do packets that
    /// cannot be decoded (logged).
    pub fn decode_measure_packet(&self, payload: &[u8]) -> Option<MeasureRecord> {
        let tag = *payload.first()?;
        match tag {
            wire::CONSUMPTION_FRAME => match self.decode_consumption(payload) {
                Ok(measures) => Some(MeasureRecord::Consumption(measures)),
                Err(err) => {
                    error!(error = %err, len = payload.len(), "dropping consumption packet");
                    None
                }
            },
            wire::RADIO_MEASURE_FRAME => match decode::decode_radio(payload) {
                Ok(measures) => Some(MeasureRecord::Radio(measures)),
                Err(err) => {
                    error!(error = %err, len = payload.len(), "dropping radio packet");
                    None
                }
            },
            wire::ACK_FRAME => {
                self.handle_ack(payload);
                None
            }
            _ => {
                warn!(tag, payload = ?payload, "unknown measure packet");
                None
            }
        }
    }

    /// Decode a consumption packet against the acknowledged layout.
    pub fn decode_consumption(
        &self,
        payload: &[u8],
    ) -> std::result::Result<ConsumptionMeasures, DecodeError> {
        let state = self.state.lock();
        decode::decode_consumption(payload, state.config.as_ref(), state.time_ref)
    }

    fn handle_ack(&self, payload: &[u8]) {
        let Some(&acked) = payload.get(1) else {
            warn!(payload = ?payload, "ack without command tag");
            return;
        };

        match acked {
            wire::RESET_TIME => self.install_time_reference(),
            wire::CONFIG_CONSUMPTION => match payload.get(2) {
                Some(&config_byte) => {
                    let config = DecodeConfig::from_ack_byte(config_byte);
                    info!(
                        fields = ?config.field_names(),
                        source = ?config.source,
                        sample_len = config.sample_len,
                        "consumption configuration acknowledged"
                    );
                    self.state.lock().config = Some(config);
                }
                None => warn!(payload = ?payload, "consumption ack without configuration"),
            },
            other => debug!(command = wire::command_name(other), tag = other, "ack ignored"),
        }
    }

    fn install_time_reference(&self) {
        let mut state = self.state.lock();
        let Some(reference) = state.pending_time.take() else {
            warn!("reset time ack without a pending request, keeping current reference");
            return;
        };
        state.time_ref = Some(reference);
        drop(state);

        let delay_us = ((self.clock.now() - reference) * 1_000_000.0).max(0.0);
        info!(reference, delay_us = delay_us as u64, "time reference set");
    }

    /// The acknowledged consumption layout, if any.
    pub fn decode_config(&self) -> Option<DecodeConfig> {
        self.state.lock().config.clone()
    }

    /// The installed time reference, in seconds since the Unix epoch.
    pub fn time_reference(&self) -> Option<f64> {
        self.state.lock().time_ref
    }
}

impl<S, C> std::fmt::Debug for Protocol<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protocol")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use bytes::Bytes;

    use super::*;
    use crate::command::PowerSource;

    /// Replays canned answers and records what was sent.
    #[derive(Default)]
    struct ScriptedSender {
        answers: Mutex<VecDeque<Option<&'static [u8]>>>,
        sent: Mutex<Vec<Vec<u8>>>,
    }

    impl ScriptedSender {
        fn answering(answers: &[Option<&'static [u8]>]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().copied().collect()),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<Vec<u8>> {
            self.sent.lock().clone()
        }
    }

    impl CommandSender for ScriptedSender {
        fn send_command(&self, payload: &[u8]) -> Option<Frame> {
            self.sent.lock().push(payload.to_vec());
            let answer = self.answers.lock().pop_front().flatten()?;
            Some(Frame::new(Bytes::from_static(answer)))
        }
    }

    struct FixedClock(Mutex<f64>);

    impl FixedClock {
        fn at(seconds: f64) -> Self {
            Self(Mutex::new(seconds))
        }

        fn set(&self, seconds: f64) {
            *self.0.lock() = seconds;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> f64 {
            *self.0.lock()
        }
    }

    impl Clock for Arc<FixedClock> {
        fn now(&self) -> f64 {
            (**self).now()
        }
    }

    fn protocol(answers: &[Option<&'static [u8]>]) -> Protocol<ScriptedSender, FixedClock> {
        Protocol::with_clock(ScriptedSender::answering(answers), FixedClock::at(1000.0))
    }

    #[test]
    fn start_stop_ack() {
        let proto = protocol(&[Some(&b"\x70\x0a"[..])]);
        proto.start_stop(Direction::Start, PowerSupply::Dc).unwrap();
        assert_eq!(proto.sender().sent(), vec![vec![0x70, 0x01]]);
    }

    #[test]
    fn start_stop_nack() {
        let proto = protocol(&[Some(&b"\x70\x02"[..])]);
        let err = proto.start_stop(Direction::Start, PowerSupply::Dc).unwrap_err();
        assert!(matches!(err, CommandError::Nack { command: "open_node_start" }));
    }

    #[test]
    fn start_stop_answer_for_other_command() {
        let proto = protocol(&[Some(&b"\x71\x0a"[..])]);
        let err = proto.start_stop(Direction::Start, PowerSupply::Dc).unwrap_err();
        match err {
            CommandError::AckMismatch { answer, .. } => assert_eq!(answer, vec![0x71, 0x0A]),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn short_or_unknown_status_is_a_mismatch() {
        let proto = protocol(&[Some(&b"\x70"[..]), Some(&b"\x70\x55"[..])]);
        assert!(matches!(
            proto.start_stop(Direction::Start, PowerSupply::Battery),
            Err(CommandError::AckMismatch { .. })
        ));
        assert!(matches!(
            proto.start_stop(Direction::Start, PowerSupply::Battery),
            Err(CommandError::AckMismatch { .. })
        ));
    }

    #[test]
    fn start_stop_timeout() {
        let proto = protocol(&[None]);
        let err = proto.start_stop(Direction::Stop, PowerSupply::Dc).unwrap_err();
        assert!(matches!(err, CommandError::Timeout { command: "open_node_stop" }));
    }

    #[test]
    fn invalid_radio_period_is_not_sent() {
        let proto = protocol(&[]);
        let err = proto.configure_radio(Some(&RadioConfig::new(500))).unwrap_err();
        assert!(matches!(err, CommandError::InvalidArgument(_)));
        assert!(proto.sender().sent().is_empty());
    }

    #[test]
    fn configure_consumption_disable() {
        let proto = protocol(&[Some(&b"\x79\x0a"[..])]);
        proto.configure_consumption(None).unwrap();
        assert_eq!(proto.sender().sent(), vec![vec![0x79, 0x00, 0x00]]);
    }

    #[test]
    fn reset_time_ack_installs_pending_reference() {
        let clock = Arc::new(FixedClock::at(1000.0));
        let proto = Protocol::with_clock(
            ScriptedSender::answering(&[Some(&b"\x72\x0a"[..])]),
            Arc::clone(&clock),
        );

        proto.reset_time().unwrap();
        assert_eq!(proto.time_reference(), None);

        clock.set(1000.002);
        assert!(proto.decode_measure_packet(&[0xFA, 0x72]).is_none());
        assert_eq!(proto.time_reference(), Some(1000.0));
    }

    #[test]
    fn reset_time_ack_without_request_is_dropped() {
        let proto = protocol(&[Some(&b"\x72\x0a"[..])]);
        assert!(proto.decode_measure_packet(&[0xFA, 0x72]).is_none());
        assert_eq!(proto.time_reference(), None);

        proto.reset_time().unwrap();
        proto.decode_measure_packet(&[0xFA, 0x72]);
        assert_eq!(proto.time_reference(), Some(1000.0));

        // A duplicate ack keeps the installed reference.
        proto.decode_measure_packet(&[0xFA, 0x72]);
        assert_eq!(proto.time_reference(), Some(1000.0));
    }

    #[test]
    fn refused_reset_time_ignores_later_ack() {
        let proto = protocol(&[Some(&b"\x72\x02"[..]), Some(&b"\x70\x0a"[..])]);

        assert!(matches!(proto.reset_time(), Err(CommandError::Nack { .. })));
        proto.decode_measure_packet(&[0xFA, 0x72]);
        assert_eq!(proto.time_reference(), None);

        assert!(matches!(proto.reset_time(), Err(CommandError::AckMismatch { .. })));
        proto.decode_measure_packet(&[0xFA, 0x72]);
        assert_eq!(proto.time_reference(), None);
    }

    #[test]
    fn timed_out_reset_time_accepts_late_ack() {
        let proto = protocol(&[None]);

        assert!(matches!(proto.reset_time(), Err(CommandError::Timeout { .. })));
        proto.decode_measure_packet(&[0xFA, 0x72]);
        assert_eq!(proto.time_reference(), Some(1000.0));
    }

    #[test]
    fn consumption_ack_replaces_layout() {
        let proto = protocol(&[]);
        assert!(proto.decode_config().is_none());

        proto.decode_measure_packet(&[0xFA, 0x79, 0x17]);
        assert_eq!(proto.decode_config().unwrap().sample_len, 16);

        proto.decode_measure_packet(&[0xFA, 0x79, 0x22]);
        let config = proto.decode_config().unwrap();
        assert_eq!(config.field_names(), vec!["t", "v"]);
        assert_eq!(config.source, Some(PowerSource::V5));
    }

    #[test]
    fn malformed_acks_are_ignored() {
        let proto = protocol(&[]);
        assert!(proto.decode_measure_packet(&[0xFA]).is_none());
        assert!(proto.decode_measure_packet(&[0xFA, 0x79]).is_none());
        assert!(proto.decode_measure_packet(&[0xFA, 0x70, 0x00]).is_none());
        assert!(proto.decode_config().is_none());
    }

    #[test]
    fn consumption_needs_configuration_and_time() {
        let proto = protocol(&[Some(&b"\x72\x0a"[..])]);
        let mut packet = vec![0xFF, 0x22, 0x01];
        packet.extend_from_slice(&32768u32.to_be_bytes());
        packet.extend_from_slice(&3.3f32.to_be_bytes());

        assert_eq!(proto.decode_consumption(&packet), Err(DecodeError::NotConfigured));

        proto.decode_measure_packet(&[0xFA, 0x79, 0x22]);
        assert_eq!(proto.decode_consumption(&packet), Err(DecodeError::NoTimeReference));
        assert!(proto.decode_measure_packet(&packet).is_none());

        proto.reset_time().unwrap();
        proto.decode_measure_packet(&[0xFA, 0x72]);
        let record = proto.decode_measure_packet(&packet).unwrap();
        match record {
            MeasureRecord::Consumption(measures) => {
                assert_eq!(measures.samples[0].timestamp, 1001.0);
                assert_eq!(measures.samples[0].voltage, Some(3.3));
            }
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn unknown_and_empty_packets() {
        let proto = protocol(&[]);
        assert!(proto.decode_measure_packet(&[]).is_none());
        assert!(proto.decode_measure_packet(&[0xF1, 0x00]).is_none());
    }

    #[test]
    fn works_through_arc_sender() {
        let sender = Arc::new(ScriptedSender::answering(&[Some(&b"\x71\x0a"[..])]));
        let proto = Protocol::with_clock(Arc::clone(&sender), FixedClock::at(0.0));
        proto.start_stop(Direction::Stop, PowerSupply::Battery).unwrap();
        assert_eq!(sender.sent(), vec![vec![0x71, 0x00]]);
    }
}
