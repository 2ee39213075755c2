//! Error types for media sessions, writers and readers

use std::net::SocketAddr;

use thiserror::Error;

/// Result type for media operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the media layer
#[derive(Debug, Error)]
pub enum Error {
    /// No RTP/RTCP port pair could be bound
    #[error("no available RTP/RTCP port pair: {0}")]
    PortExhaustion(String),

    /// An explicitly requested local address could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested
        addr: SocketAddr,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Local and remote format lists do not intersect
    #[error("no common media format: local={local:?} remote={remote:?}")]
    NoCommonFormat {
        /// Formats offered locally
        local: Vec<String>,
        /// Formats in the remote answer
        remote: Vec<String>,
    },

    /// Format identifier that is not a valid RTP payload type
    #[error("invalid media format {0:?}")]
    InvalidFormat(String),

    /// Received packet carries a different payload type than expected
    #[error("payload type does not match: expected={expected}, actual={actual}")]
    PayloadTypeMismatch {
        /// Payload type the reader expects
        expected: u8,
        /// Payload type of the received packet
        actual: u8,
    },

    /// Datagram was only partially sent
    #[error("short write: sent {written} of {expected} bytes")]
    ShortWrite {
        /// Bytes handed to the socket
        written: usize,
        /// Bytes in the datagram
        expected: usize,
    },

    /// Write attempted before a remote address was negotiated
    #[error("remote address not set")]
    RemoteNotSet,

    /// RTCP call on a session without an RTCP socket
    #[error("RTCP is disabled for this session")]
    RtcpDisabled,

    /// Session was closed while reading
    #[error("end of stream")]
    EndOfStream,

    /// Write attempted on a closed session
    #[error("media session closed")]
    SessionClosed,

    /// Deadline passed before the operation completed
    #[error("operation timed out")]
    Timeout,

    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// RTP/RTCP/DTMF encoding or decoding error
    #[error("packet error: {0}")]
    Packet(#[from] sipmedia_rtp_core::Error),

    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config(message.into())
    }

    /// True for the errors that end a read or write loop for good
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::EndOfStream | Error::SessionClosed)
    }
}

impl From<sipmedia_infra_common::Error> for Error {
    fn from(err: sipmedia_infra_common::Error) -> Self {
        Error::Config(err.to_string())
    }
}
