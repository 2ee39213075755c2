//! # sipmedia media core
//!
//! RTP/RTCP transport for a SIP user agent:
//!
//! - [`MediaSession`] binds the RTP/RTCP socket pair, negotiates formats
//!   against the remote answer and does datagram I/O
//! - [`RtpWriter`] packetizes and paces an outgoing stream, including
//!   RFC 4733 DTMF
//! - [`RtpReader`] turns incoming packets into a payload byte stream while
//!   tracking sequence continuity per source
//!
//! ```no_run
//! # async fn run() -> sipmedia_media_core::Result<()> {
//! use std::sync::Arc;
//! use sipmedia_media_core::{MediaDescription, MediaSession, RtpWriter};
//!
//! let session = Arc::new(MediaSession::new("127.0.0.1:0".parse().unwrap()).await?);
//! let answer = MediaDescription::new("127.0.0.1".parse().unwrap(), 30000, vec!["8".into()]);
//! session.negotiate_remote(&answer)?;
//!
//! let mut writer = RtpWriter::new(session.clone())?;
//! writer.write(&[0xd5; 160]).await?;
//! session.close();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod rtp;
pub mod session;

pub use config::{MediaConfig, PortRange};
pub use error::{Error, Result};
pub use format::{MediaDescription, Mode};
pub use rtp::{ReaderStats, RtpPacketCallback, RtpReader, RtpWriter};
pub use session::{MediaSession, PortAllocator};

pub use sipmedia_rtp_core::{DtmfEvent, RtcpPacket, RtpHeader, RtpPacket};
