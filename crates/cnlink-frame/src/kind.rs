//! Packet classification by type tag.
//!
//! Tags with the high nibble set (`0xF_`) are measurement-path packets
//! (measures and configuration acknowledgements). `0xEE` is an unsolicited
//! error report. Everything else answers a command.

/// High nibble shared by every measurement-path tag.
pub const MEASURE_MASK: u8 = 0xF0;

/// Unsolicited control node error report: `[0xEE, i8 code]`.
pub const ERROR_FRAME: u8 = 0xEE;

/// Where an inbound packet belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Measurement or acknowledgement, queued for the measures decoder.
    Measurement,
    /// Error report from the control node firmware.
    ErrorReport,
    /// Answer to the command currently in flight.
    Answer,
}

/// Classify a packet by its first byte. Returns `None` for an empty payload.
pub fn classify(payload: &[u8]) -> Option<PacketKind> {
    let tag = *payload.first()?;
    let kind = if tag & MEASURE_MASK == MEASURE_MASK {
        PacketKind::Measurement
    } else if tag == ERROR_FRAME {
        PacketKind::ErrorReport
    } else {
        PacketKind::Answer
    };
    Some(kind)
}

/// Returns a human-readable name for a packet kind.
pub fn kind_name(kind: PacketKind) -> &'static str {
    match kind {
        PacketKind::Measurement => "MEASURE",
        PacketKind::ErrorReport => "ERROR",
        PacketKind::Answer => "ANSWER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurement_tags() {
        for tag in 0xF0..=0xFFu8 {
            assert_eq!(classify(&[tag]), Some(PacketKind::Measurement));
        }
    }

    #[test]
    fn answers_and_errors() {
        assert_eq!(classify(&[0x70, 0x0A]), Some(PacketKind::Answer));
        assert_eq!(classify(&[0x79, 0x02]), Some(PacketKind::Answer));
        assert_eq!(classify(&[0xEE, 0xFD]), Some(PacketKind::ErrorReport));
        assert_eq!(classify(&[0xE0]), Some(PacketKind::Answer));
    }

    #[test]
    fn empty_payload_has_no_kind() {
        assert_eq!(classify(&[]), None);
    }

    #[test]
    fn names() {
        assert_eq!(kind_name(PacketKind::Measurement), "MEASURE");
        assert_eq!(kind_name(PacketKind::ErrorReport), "ERROR");
        assert_eq!(kind_name(PacketKind::Answer), "ANSWER");
    }
}
