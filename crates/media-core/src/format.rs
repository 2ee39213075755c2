//! Payload formats, stream direction and format negotiation
//!
//! Formats are carried as the payload-type strings that appear on an SDP
//! media line (`"0"`, `"8"`, `"101"`). Negotiation keeps the formats both
//! sides support, in the order the remote answer lists them.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sipmedia_rtp_core::time::clock_rates;

use crate::error::{Error, Result};

/// G.711 mu-law
pub const FORMAT_TYPE_ULAW: &str = "0";
/// G.711 A-law
pub const FORMAT_TYPE_ALAW: &str = "8";
/// G.722, advertised with an 8 kHz RTP clock
pub const FORMAT_TYPE_G722: &str = "9";
/// RFC 4733 telephone-event, conventionally on dynamic type 101
pub const FORMAT_TYPE_TELEPHONE_EVENT: &str = "101";

/// Formats offered when nothing else is configured
pub fn default_formats() -> Vec<String> {
    vec![FORMAT_TYPE_ULAW.to_string(), FORMAT_TYPE_ALAW.to_string()]
}

/// Parse a format identifier into its RTP payload type
pub fn format_numeric(format: &str) -> Result<u8> {
    format
        .parse::<u8>()
        .ok()
        .filter(|pt| *pt <= 127)
        .ok_or_else(|| Error::InvalidFormat(format.to_string()))
}

/// RTP clock rate for the formats this layer knows
pub fn format_clock_rate(format: &str) -> Option<u32> {
    match format {
        FORMAT_TYPE_ULAW | FORMAT_TYPE_ALAW | FORMAT_TYPE_G722 | FORMAT_TYPE_TELEPHONE_EVENT => {
            Some(clock_rates::AUDIO_8KHZ)
        }
        _ => None,
    }
}

/// Intersect local and remote formats, keeping the remote order
///
/// An empty local list adopts the remote list as is. An empty result is
/// [`Error::NoCommonFormat`].
pub fn negotiate_formats(local: &[String], remote: &[String]) -> Result<Vec<String>> {
    let common: Vec<String> = if local.is_empty() {
        remote.to_vec()
    } else {
        remote
            .iter()
            .filter(|f| local.contains(f))
            .cloned()
            .collect()
    };

    if common.is_empty() {
        return Err(Error::NoCommonFormat {
            local: local.to_vec(),
            remote: remote.to_vec(),
        });
    }
    Ok(common)
}

/// Stream direction as negotiated in the session description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Both directions
    #[default]
    SendRecv,
    /// Local side only sends
    SendOnly,
    /// Local side only receives
    RecvOnly,
    /// No media in either direction (hold)
    Inactive,
}

impl Mode {
    /// Attribute name as written in SDP
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::SendRecv => "sendrecv",
            Mode::SendOnly => "sendonly",
            Mode::RecvOnly => "recvonly",
            Mode::Inactive => "inactive",
        }
    }

    /// Direction the local side takes when the remote side advertises `self`
    pub fn reverse(&self) -> Mode {
        match self {
            Mode::SendOnly => Mode::RecvOnly,
            Mode::RecvOnly => Mode::SendOnly,
            other => *other,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sendrecv" => Ok(Mode::SendRecv),
            "sendonly" => Ok(Mode::SendOnly),
            "recvonly" => Ok(Mode::RecvOnly),
            "inactive" => Ok(Mode::Inactive),
            other => Err(Error::config(format!("unknown media mode: {}", other))),
        }
    }
}

/// Audio media description exchanged with the signaling layer
///
/// Built from a parsed remote answer, or produced by
/// [`MediaSession::local_description`](crate::MediaSession::local_description)
/// for the local offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescription {
    /// Connection address
    pub ip: IpAddr,
    /// RTP port; RTCP is on the next port
    pub port: u16,
    /// Stream direction
    #[serde(default)]
    pub mode: Mode,
    /// Payload formats in preference order
    pub formats: Vec<String>,
}

impl MediaDescription {
    /// Create a `sendrecv` description
    pub fn new(ip: IpAddr, port: u16, formats: Vec<String>) -> Self {
        Self {
            ip,
            port,
            mode: Mode::SendRecv,
            formats,
        }
    }

    /// Set the stream direction
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}
