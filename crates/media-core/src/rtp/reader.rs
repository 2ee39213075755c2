//! Incoming RTP stream: payload delivery and per-source sequence tracking

use std::sync::Arc;

use bytes::Bytes;
use sipmedia_rtp_core::{ExtendedSequenceNumber, RtpHeader, RtpPacket, RtpSsrc, DEFAULT_MAX_PACKET_SIZE};
use tracing::{debug, trace, warn};

use super::RtpPacketCallback;
use crate::error::{Error, Result};
use crate::format::{format_clock_rate, format_numeric};
use crate::session::MediaSession;

/// Counters kept by an [`RtpReader`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Packets accepted
    pub packets: u64,
    /// Payload bytes accepted
    pub bytes: u64,
    /// Packets whose extended sequence number was not previous + 1
    pub out_of_order: u64,
    /// Packets rejected by the sequence tracker as late across a wrap
    pub regressions: u64,
    /// Times the remote SSRC changed
    pub ssrc_changes: u64,
}

/// Extracts RTP payloads from a media session as a byte stream
///
/// There is no jitter buffer: packets are delivered in arrival order and
/// ordering anomalies are only logged and counted. A payload larger than the
/// caller's buffer is handed out over several reads without touching the
/// socket again.
pub struct RtpReader {
    session: Arc<MediaSession>,
    payload_type: u8,

    sequence: ExtendedSequenceNumber,
    last_ssrc: Option<RtpSsrc>,

    scratch: Vec<u8>,
    pending: Bytes,
    packet_header: Option<RtpHeader>,

    on_rtp: Option<RtpPacketCallback>,
    stats: ReaderStats,
}

impl RtpReader {
    /// Reader expecting the session's first negotiated format
    pub fn new(session: Arc<MediaSession>) -> Result<Self> {
        let formats = session.formats();
        let format = formats
            .first()
            .ok_or_else(|| Error::config("media session has no formats to read"))?;

        let payload_type = format_numeric(format)?;
        if format_clock_rate(format).is_none() {
            warn!("Unsupported format {}. Using default clock rate", format);
        }

        Ok(Self {
            session,
            payload_type,
            sequence: ExtendedSequenceNumber::default(),
            last_ssrc: None,
            scratch: vec![0u8; DEFAULT_MAX_PACKET_SIZE],
            pending: Bytes::new(),
            packet_header: None,
            on_rtp: None,
            stats: ReaderStats::default(),
        })
    }

    /// Copy the next payload bytes into `buf`
    ///
    /// Leftover bytes of the previous packet are returned first. Otherwise
    /// one datagram is read from the session; a payload type other than the
    /// expected one fails with [`Error::PayloadTypeMismatch`]. Once the
    /// session is closed this returns [`Error::EndOfStream`].
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.pending.is_empty() {
            return Ok(self.drain_pending(buf));
        }

        let n = self.session.read_rtp_raw(&mut self.scratch).await?;
        let packet = RtpPacket::parse(&self.scratch[..n])?;

        if packet.header.payload_type != self.payload_type {
            return Err(Error::PayloadTypeMismatch {
                expected: self.payload_type,
                actual: packet.header.payload_type,
            });
        }

        if self.session.config().rtp_debug {
            trace!("Recv RTP\n{}", packet);
        }

        self.track_sequence(&packet.header);
        self.stats.packets += 1;
        self.stats.bytes += packet.payload.len() as u64;

        if let Some(callback) = &self.on_rtp {
            callback(&packet);
        }

        let RtpPacket { header, payload } = packet;
        self.packet_header = Some(header);
        self.pending = payload;
        Ok(self.drain_pending(buf))
    }

    fn track_sequence(&mut self, header: &RtpHeader) {
        let seq = header.sequence_number;

        if self.last_ssrc == Some(header.ssrc) {
            let expected = self.sequence.extended() + 1;
            if let Err(e) = self.sequence.update(seq) {
                warn!("{}", e);
                self.stats.regressions += 1;
            }

            let actual = self.sequence.extended();
            if actual != expected {
                warn!(
                    expected,
                    actual,
                    real = seq,
                    "Out of order pkt received"
                );
                self.stats.out_of_order += 1;
            }
        } else {
            if let Some(previous) = self.last_ssrc {
                debug!(
                    "RTP source changed {:#010x} -> {:#010x}",
                    previous, header.ssrc
                );
                self.stats.ssrc_changes += 1;
            }
            self.sequence.init(seq);
        }

        self.last_ssrc = Some(header.ssrc);
    }

    fn drain_pending(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending.split_to(n));
        n
    }

    /// Register a callback invoked with every accepted packet
    pub fn on_rtp<F>(&mut self, callback: F)
    where
        F: Fn(&RtpPacket) + Send + Sync + 'static,
    {
        self.on_rtp = Some(Arc::new(callback));
    }

    /// Header of the last accepted packet
    pub fn packet_header(&self) -> Option<&RtpHeader> {
        self.packet_header.as_ref()
    }

    /// Expected payload type
    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    /// Change the expected payload type
    pub fn set_payload_type(&mut self, payload_type: u8) {
        self.payload_type = payload_type;
    }

    /// Reception counters
    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Extended sequence state of the current source
    pub fn sequence(&self) -> &ExtendedSequenceNumber {
        &self.sequence
    }

    /// SSRC of the source being tracked
    pub fn last_ssrc(&self) -> Option<RtpSsrc> {
        self.last_ssrc
    }

    /// Payload bytes buffered for the next [`read`](Self::read)
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Session this reader receives from
    pub fn session(&self) -> &Arc<MediaSession> {
        &self.session
    }
}

impl std::fmt::Debug for RtpReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtpReader")
            .field("payload_type", &self.payload_type)
            .field("last_ssrc", &self.last_ssrc)
            .field("sequence", &self.sequence)
            .field("pending", &self.pending.len())
            .field("stats", &self.stats)
            .finish()
    }
}
