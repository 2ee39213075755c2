//! RTP stream endpoints on top of a [`MediaSession`](crate::MediaSession)

mod reader;
mod writer;

use std::sync::Arc;

use sipmedia_rtp_core::RtpPacket;

pub use reader::{ReaderStats, RtpReader};
pub use writer::RtpWriter;

/// Per-packet observer, invoked synchronously on the I/O path
pub type RtpPacketCallback = Arc<dyn Fn(&RtpPacket) + Send + Sync>;
