//! Error types for the RTP wire layer

use thiserror::Error;

/// Errors produced while encoding or decoding RTP, RTCP and DTMF payloads
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Not enough bytes left to decode a field
    #[error("buffer too small: required {required} bytes, available {available}")]
    BufferTooSmall {
        /// Bytes needed
        required: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// Version field was not 2
    #[error("invalid RTP version {0}, expected 2")]
    InvalidVersion(u8),

    /// Structurally malformed packet
    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    /// DTMF payload shorter than the 4-byte event layout
    #[error("DTMF payload too short: {len} bytes, need 4")]
    PayloadTooShort {
        /// Length of the offending payload
        len: usize,
    },

    /// Character with no RFC 4733 event code
    #[error("unknown DTMF digit {0:?}")]
    UnknownDigit(char),

    /// Sequence number stepped backwards across a wrap boundary
    #[error("sequence regression: last={last} received={received}")]
    SequenceRegression {
        /// Last accepted 16-bit sequence number
        last: u16,
        /// Sequence number that was rejected
        received: u16,
    },
}
