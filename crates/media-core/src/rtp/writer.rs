//! Outgoing RTP stream: packetization, pacing and DTMF

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use sipmedia_rtp_core::dtmf::dtmf_encode;
use sipmedia_rtp_core::packet::rtcp::RtcpSenderReport;
use sipmedia_rtp_core::time::{clock_rates, samples_per_packet};
use sipmedia_rtp_core::{NtpTimestamp, RtpHeader, RtpPacket, RtpSequencer, RtpSsrc, RtpTimestamp};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use super::RtpPacketCallback;
use crate::error::{Error, Result};
use crate::format::{format_clock_rate, format_numeric};
use crate::session::MediaSession;

/// Packetizes payload frames into RTP and paces them onto a media session
///
/// One writer is one outgoing stream with its own SSRC. Sequence numbers
/// start at a random value and wrap; timestamps advance by the clock delta of
/// each packet and wrap silently. Payloads larger than the path MTU are sent
/// as is.
pub struct RtpWriter {
    session: Arc<MediaSession>,
    sequencer: RtpSequencer,

    payload_type: u8,
    ssrc: RtpSsrc,
    sample_rate: u32,
    ptime: Duration,
    clock_rate_timestamp: RtpTimestamp,
    next_timestamp: RtpTimestamp,

    ticker: Option<Interval>,
    last_packet: Option<RtpPacket>,
    on_rtp: Option<RtpPacketCallback>,

    packets_sent: u32,
    octets_sent: u32,
}

impl RtpWriter {
    /// Writer for the session's first negotiated format
    pub fn new(session: Arc<MediaSession>) -> Result<Self> {
        let formats = session.formats();
        let format = formats
            .first()
            .ok_or_else(|| Error::config("media session has no formats to write"))?;

        let payload_type = format_numeric(format)?;
        let sample_rate = format_clock_rate(format).unwrap_or_else(|| {
            warn!("Unsupported format {}. Using default clock rate", format);
            clock_rates::AUDIO_8KHZ
        });

        let ptime = session.config().ptime();
        let next_timestamp = if session.config().random_initial_timestamp {
            rand::random()
        } else {
            0
        };

        let writer = Self {
            sequencer: RtpSequencer::new(),
            payload_type,
            ssrc: rand::random(),
            sample_rate,
            ptime,
            clock_rate_timestamp: samples_per_packet(sample_rate, ptime),
            next_timestamp,
            ticker: None,
            last_packet: None,
            on_rtp: None,
            packets_sent: 0,
            octets_sent: 0,
            session,
        };

        debug!(
            "RTP writer ssrc={:#010x} pt={} rate={} ptime={:?}",
            writer.ssrc, writer.payload_type, writer.sample_rate, writer.ptime
        );
        Ok(writer)
    }

    /// Send one frame covering one packetization interval, then wait for the
    /// next pacing tick
    ///
    /// The first packet of the writer carries the marker bit. The pacing wait
    /// happens even when the send fails.
    pub async fn write(&mut self, frame: &[u8]) -> Result<usize> {
        let marker = self.last_packet.is_none();
        let result = self
            .write_samples(frame, self.clock_rate_timestamp, marker, self.payload_type)
            .await;
        self.tick().await;
        result
    }

    /// Send one packet without pacing
    ///
    /// `clock_ticks` is how far the timestamp advances after this packet.
    /// Returns the number of payload bytes accepted.
    pub async fn write_samples(
        &mut self,
        payload: &[u8],
        clock_ticks: RtpTimestamp,
        marker: bool,
        payload_type: u8,
    ) -> Result<usize> {
        let mut header = RtpHeader::new(
            payload_type,
            self.sequencer.next_seq(),
            self.next_timestamp,
            self.ssrc,
        );
        header.marker = marker;
        let packet = RtpPacket::new(header, Bytes::copy_from_slice(payload));

        if let Some(callback) = &self.on_rtp {
            callback(&packet);
        }

        self.next_timestamp = self.next_timestamp.wrapping_add(clock_ticks);

        let result = self.session.write_rtp(&packet).await;
        self.last_packet = Some(packet);
        result?;

        self.packets_sent = self.packets_sent.wrapping_add(1);
        self.octets_sent = self.octets_sent.wrapping_add(payload.len() as u32);
        Ok(payload.len())
    }

    /// Send a DTMF digit as RFC 4733 telephone events
    ///
    /// All events share the timestamp of the event start, the first carries
    /// the marker bit, and each is paced by one packetization interval. The
    /// timestamp then moves past the event duration.
    pub async fn write_dtmf(&mut self, digit: char, payload_type: u8) -> Result<()> {
        let events = dtmf_encode(digit)?;
        let start = self.next_timestamp;
        let mut duration = 0u16;

        for (i, event) in events.iter().enumerate() {
            self.write_samples(&event.pack(), 0, i == 0, payload_type)
                .await?;
            duration = event.duration;
            self.tick().await;
        }

        self.next_timestamp = start.wrapping_add(duration as RtpTimestamp);
        debug!("DTMF {} sent with {} events", digit, events.len());
        Ok(())
    }

    /// Change the packetization interval
    ///
    /// A zero interval is rejected and leaves the writer unchanged.
    pub fn update_clock_rate(&mut self, ptime: Duration) -> Result<()> {
        if ptime.is_zero() {
            return Err(Error::config("packetization interval must be greater than zero"));
        }
        self.ptime = ptime;
        self.clock_rate_timestamp = samples_per_packet(self.sample_rate, ptime);
        // Recreated with the new period on the next write
        self.ticker = None;
        Ok(())
    }

    async fn tick(&mut self) {
        let ptime = self.ptime;
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = interval_at(Instant::now() + ptime, ptime);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });
        ticker.tick().await;
    }

    /// Build a sender report for what this writer has sent so far
    pub fn sender_report(&self) -> RtcpSenderReport {
        RtcpSenderReport::new(
            self.ssrc,
            NtpTimestamp::now(),
            self.next_timestamp,
            self.packets_sent,
            self.octets_sent,
        )
    }

    /// Register a callback invoked with every packet before it is sent
    pub fn on_rtp<F>(&mut self, callback: F)
    where
        F: Fn(&RtpPacket) + Send + Sync + 'static,
    {
        self.on_rtp = Some(Arc::new(callback));
    }

    /// Payload type used by [`write`](Self::write)
    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    /// Override the payload type
    pub fn set_payload_type(&mut self, payload_type: u8) {
        self.payload_type = payload_type;
    }

    /// Stream SSRC
    pub fn ssrc(&self) -> RtpSsrc {
        self.ssrc
    }

    /// Override the SSRC
    pub fn set_ssrc(&mut self, ssrc: RtpSsrc) {
        self.ssrc = ssrc;
    }

    /// RTP clock rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Override the RTP clock rate, keeping the packetization interval
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.clock_rate_timestamp = samples_per_packet(sample_rate, self.ptime);
    }

    /// Timestamp increment per [`write`](Self::write)
    pub fn clock_rate_timestamp(&self) -> RtpTimestamp {
        self.clock_rate_timestamp
    }

    /// Packetization interval
    pub fn ptime(&self) -> Duration {
        self.ptime
    }

    /// Timestamp the next packet will carry
    pub fn next_timestamp(&self) -> RtpTimestamp {
        self.next_timestamp
    }

    /// Sequence number the next packet will carry
    pub fn next_sequence_number(&self) -> u16 {
        self.sequencer.peek()
    }

    /// Last packet handed to the session
    pub fn last_packet(&self) -> Option<&RtpPacket> {
        self.last_packet.as_ref()
    }

    /// Packets successfully sent
    pub fn packets_sent(&self) -> u32 {
        self.packets_sent
    }

    /// Payload octets successfully sent
    pub fn octets_sent(&self) -> u32 {
        self.octets_sent
    }

    /// Session this writer sends on
    pub fn session(&self) -> &Arc<MediaSession> {
        &self.session
    }
}

impl std::fmt::Debug for RtpWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtpWriter")
            .field("ssrc", &self.ssrc)
            .field("payload_type", &self.payload_type)
            .field("sample_rate", &self.sample_rate)
            .field("ptime", &self.ptime)
            .field("next_timestamp", &self.next_timestamp)
            .field("next_sequence_number", &self.sequencer.peek())
            .finish()
    }
}
