//! Media session configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::format::{default_formats, Mode};

/// Default packetization interval in milliseconds
pub const DEFAULT_PTIME_MS: u64 = 20;

/// Default number of ephemeral RTP/RTCP bind attempts
pub const DEFAULT_EPHEMERAL_BIND_RETRIES: usize = 10;

/// Half-open local port range `[start, end)` for RTP/RTCP pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    /// First port (inclusive)
    pub start: u16,
    /// Last port (exclusive)
    pub end: u16,
}

impl PortRange {
    /// Create a range
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// Number of RTP/RTCP pairs that fit with both ports inside the range
    pub fn pairs(&self) -> usize {
        (self.end.saturating_sub(self.start) / 2) as usize
    }

    /// RTP port of the pair at `index`
    pub fn pair_port(&self, index: usize) -> u16 {
        self.start + (index * 2) as u16
    }

    fn validate(&self) -> Result<()> {
        if self.start == 0 || self.end <= self.start {
            return Err(Error::config(format!(
                "invalid RTP port range {}..{}",
                self.start, self.end
            )));
        }
        if self.pairs() == 0 {
            return Err(Error::config(format!(
                "RTP port range {}..{} cannot hold an RTP/RTCP pair",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

/// Configuration for a [`MediaSession`](crate::MediaSession) and its writer/reader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Local range used when binding to port 0; ephemeral ports otherwise
    pub port_range: Option<PortRange>,

    /// Locally offered formats, in preference order
    pub formats: Vec<String>,

    /// Initial stream direction
    pub mode: Mode,

    /// Packetization interval for the RTP writer
    pub ptime_ms: u64,

    /// Bind an RTCP socket at RTP port + 1
    pub rtcp_enabled: bool,

    /// Start writer timestamps at a random value instead of 0
    pub random_initial_timestamp: bool,

    /// Trace every RTP packet read or written
    pub rtp_debug: bool,

    /// Trace every RTCP packet read or written
    pub rtcp_debug: bool,

    /// Bind attempts when no range is configured
    pub ephemeral_bind_retries: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            port_range: None,
            formats: default_formats(),
            mode: Mode::SendRecv,
            ptime_ms: DEFAULT_PTIME_MS,
            rtcp_enabled: true,
            random_initial_timestamp: false,
            rtp_debug: false,
            rtcp_debug: false,
            ephemeral_bind_retries: DEFAULT_EPHEMERAL_BIND_RETRIES,
        }
    }
}

impl MediaConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind port-0 sessions inside `[start, end)`
    pub fn with_port_range(mut self, start: u16, end: u16) -> Self {
        self.port_range = Some(PortRange::new(start, end));
        self
    }

    /// Offer these formats
    pub fn with_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.formats = formats.into_iter().map(Into::into).collect();
        self
    }

    /// Start in this direction
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Packetization interval
    pub fn with_ptime(mut self, ptime: Duration) -> Self {
        self.ptime_ms = ptime.as_millis() as u64;
        self
    }

    /// Enable or disable the RTCP socket
    pub fn with_rtcp(mut self, enabled: bool) -> Self {
        self.rtcp_enabled = enabled;
        self
    }

    /// Randomize the writer's initial timestamp
    pub fn with_random_initial_timestamp(mut self) -> Self {
        self.random_initial_timestamp = true;
        self
    }

    /// Trace RTP and RTCP packets
    pub fn with_packet_debug(mut self, rtp: bool, rtcp: bool) -> Self {
        self.rtp_debug = rtp;
        self.rtcp_debug = rtcp;
        self
    }

    /// Packetization interval as a duration
    pub fn ptime(&self) -> Duration {
        Duration::from_millis(self.ptime_ms)
    }

    /// Check the configuration for values the session cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.ptime_ms == 0 {
            return Err(Error::config("ptime_ms must be greater than zero"));
        }
        if self.ephemeral_bind_retries == 0 {
            return Err(Error::config("ephemeral_bind_retries must be at least 1"));
        }
        if let Some(range) = &self.port_range {
            range.validate()?;
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = sipmedia_infra_common::config::from_toml_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = sipmedia_infra_common::config::load_toml_file(path)?;
        config.validate()?;
        Ok(config)
    }
}
