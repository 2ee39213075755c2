//! # sipmedia RTP core
//!
//! Wire-level building blocks for the sipmedia transport:
//!
//! - [`packet`]: RTP header/packet codec and RTCP framing (SR, RR, BYE and passthrough)
//! - [`sequence`]: extended (wrap-safe) sequence tracking and outbound sequencing
//! - [`dtmf`]: RFC 4733 telephone-event payloads
//! - [`time`]: RTP clock conversions
//!
//! Nothing in this crate touches sockets; see `sipmedia-media-core` for sessions,
//! writers and readers.

pub mod dtmf;
pub mod error;
pub mod packet;
pub mod sequence;
pub mod time;

pub use dtmf::{dtmf_digit, dtmf_encode, DtmfEvent};
pub use error::Error;
pub use packet::rtcp::{NtpTimestamp, RtcpPacket};
pub use packet::{RtpHeader, RtpPacket};
pub use sequence::{ExtendedSequenceNumber, RtpSequencer};

/// Result type for wire-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// RTP synchronization source identifier
pub type RtpSsrc = u32;

/// RTP sequence number (16 bits on the wire)
pub type RtpSequenceNumber = u16;

/// RTP media timestamp
pub type RtpTimestamp = u32;

/// Size of scratch buffers used for a single datagram
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1600;

/// RTP version emitted and accepted by this crate
pub const RTP_VERSION: u8 = 2;
