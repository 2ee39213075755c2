//! RFC 4733 telephone events
//!
//! A digit is sent as a burst of event payloads that share one RTP timestamp:
//! four in-progress updates with growing duration followed by three copies of
//! the end event, so that losing a packet or two does not lose the digit.
//! Durations assume the 8 kHz telephone-event clock.

use std::fmt;

use crate::error::Error;
use crate::Result;

/// Size of an encoded event payload
pub const DTMF_EVENT_SIZE: usize = 4;

/// Volume used for generated events (dBm0 below 0)
pub const DTMF_DEFAULT_VOLUME: u8 = 10;

/// Duration step between in-progress updates, 20 ms at 8 kHz
const DURATION_STEP: u16 = 160;

const IN_PROGRESS_EVENTS: u16 = 4;
const END_EVENTS: usize = 3;

const DTMF_DIGITS: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '*', '#', 'A', 'B', 'C', 'D',
];

/// One telephone-event payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtmfEvent {
    /// Event code, 0-15 for DTMF
    pub event: u8,

    /// E bit
    pub end_of_event: bool,

    /// Volume, 0-63
    pub volume: u8,

    /// Duration in timestamp units
    pub duration: u16,
}

impl DtmfEvent {
    /// Encode into the 4-byte wire layout
    ///
    /// Byte 1 carries the E bit in bit 7 and the volume in bits 0-5; the
    /// reserved bit is always written as zero.
    pub fn pack(&self) -> [u8; DTMF_EVENT_SIZE] {
        let mut flags = self.volume & 0x3F;
        if self.end_of_event {
            flags |= 0x80;
        }
        let duration = self.duration.to_be_bytes();
        [self.event, flags, duration[0], duration[1]]
    }

    /// Decode from a payload; extra trailing bytes are ignored
    pub fn unpack(payload: &[u8]) -> Result<Self> {
        if payload.len() < DTMF_EVENT_SIZE {
            return Err(Error::PayloadTooShort { len: payload.len() });
        }

        Ok(Self {
            event: payload[0],
            end_of_event: payload[1] & 0x80 != 0,
            volume: payload[1] & 0x3F,
            duration: u16::from_be_bytes([payload[2], payload[3]]),
        })
    }

    /// Digit this event stands for, if it is a DTMF event
    pub fn digit(&self) -> Option<char> {
        dtmf_digit(self.event)
    }
}

impl fmt::Display for DtmfEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RTP DTMF Event:")?;
        writeln!(f, "\tEvent: {}", self.event)?;
        writeln!(f, "\tEndOfEvent: {}", self.end_of_event)?;
        writeln!(f, "\tVolume: {}", self.volume)?;
        write!(f, "\tDuration: {}", self.duration)
    }
}

/// Event code for a digit
pub fn dtmf_event_code(digit: char) -> Result<u8> {
    DTMF_DIGITS
        .iter()
        .position(|&d| d == digit)
        .map(|code| code as u8)
        .ok_or(Error::UnknownDigit(digit))
}

/// Digit for an event code
pub fn dtmf_digit(event: u8) -> Option<char> {
    DTMF_DIGITS.get(event as usize).copied()
}

/// Build the redundant event series for one digit
pub fn dtmf_encode(digit: char) -> Result<Vec<DtmfEvent>> {
    let event = dtmf_event_code(digit)?;

    let progress = (1..=IN_PROGRESS_EVENTS).map(|i| DtmfEvent {
        event,
        end_of_event: false,
        volume: DTMF_DEFAULT_VOLUME,
        duration: DURATION_STEP * i,
    });

    // End events all repeat the final duration, it must not grow further
    let final_duration = DURATION_STEP * (IN_PROGRESS_EVENTS + 1);
    let end = std::iter::repeat(DtmfEvent {
        event,
        end_of_event: true,
        volume: DTMF_DEFAULT_VOLUME,
        duration: final_duration,
    })
    .take(END_EVENTS);

    Ok(progress.chain(end).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_five() {
        let events = dtmf_encode('5').unwrap();
        assert_eq!(events.len(), 7);

        let durations: Vec<u16> = events.iter().map(|e| e.duration).collect();
        assert_eq!(durations, vec![160, 320, 480, 640, 800, 800, 800]);

        assert!(events[..4].iter().all(|e| !e.end_of_event));
        assert!(events[4..].iter().all(|e| e.end_of_event));
        assert!(events.iter().all(|e| e.event == 5));
    }

    #[test]
    fn test_digit_table() {
        assert_eq!(dtmf_event_code('0').unwrap(), 0);
        assert_eq!(dtmf_event_code('*').unwrap(), 10);
        assert_eq!(dtmf_event_code('#').unwrap(), 11);
        assert_eq!(dtmf_event_code('D').unwrap(), 15);
        assert_eq!(dtmf_digit(12), Some('A'));
        assert_eq!(dtmf_digit(16), None);
    }

    #[test]
    fn test_unknown_digit() {
        assert_eq!(dtmf_encode('x').unwrap_err(), Error::UnknownDigit('x'));
        assert_eq!(dtmf_encode('a').unwrap_err(), Error::UnknownDigit('a'));
    }

    #[test]
    fn test_pack_layout() {
        let event = DtmfEvent {
            event: 11,
            end_of_event: true,
            volume: 10,
            duration: 0x0320,
        };
        assert_eq!(event.pack(), [11, 0x8A, 0x03, 0x20]);
    }

    #[test]
    fn test_unpack_too_short() {
        assert_eq!(
            DtmfEvent::unpack(&[1, 2, 3]).unwrap_err(),
            Error::PayloadTooShort { len: 3 }
        );
    }

    #[test]
    fn test_unpack_ignores_reserved_bit() {
        let event = DtmfEvent::unpack(&[3, 0x40 | 0x05, 0, 160]).unwrap();
        assert_eq!(event.volume, 5);
        assert!(!event.end_of_event);
        assert_eq!(event.digit(), Some('3'));
    }

    proptest! {
        #[test]
        fn prop_pack_unpack(event in 0u8..16, end in any::<bool>(), volume in 0u8..64, duration in any::<u16>()) {
            let ev = DtmfEvent { event, end_of_event: end, volume, duration };
            prop_assert_eq!(DtmfEvent::unpack(&ev.pack()).unwrap(), ev);
        }
    }
}
