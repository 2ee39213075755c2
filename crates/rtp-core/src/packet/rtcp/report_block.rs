use bytes::{Buf, BufMut, BytesMut};

use crate::error::Error;
use crate::{Result, RtpSsrc};

/// Reception report block carried in SR and RR packets
/// Defined in RFC 3550 Section 6.4.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcpReportBlock {
    /// Source this block reports on
    pub ssrc: RtpSsrc,

    /// Fraction lost since the previous report (fixed point, /256)
    pub fraction_lost: u8,

    /// Cumulative packets lost (24 bits on the wire)
    pub cumulative_lost: u32,

    /// Extended highest sequence number received
    pub highest_seq: u32,

    /// Interarrival jitter in timestamp units
    pub jitter: u32,

    /// Middle 32 bits of the last SR NTP timestamp
    pub last_sr: u32,

    /// Delay since last SR, in 1/65536 seconds
    pub delay_since_last_sr: u32,
}

impl RtcpReportBlock {
    /// Encoded size of one block
    pub const SIZE: usize = 24;

    /// Create an all-zero block for a source
    pub fn new(ssrc: RtpSsrc) -> Self {
        Self {
            ssrc,
            fraction_lost: 0,
            cumulative_lost: 0,
            highest_seq: 0,
            jitter: 0,
            last_sr: 0,
            delay_since_last_sr: 0,
        }
    }

    /// Decode one block
    pub fn parse(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < Self::SIZE {
            return Err(Error::BufferTooSmall {
                required: Self::SIZE,
                available: buf.remaining(),
            });
        }

        let ssrc = buf.get_u32();
        let loss = buf.get_u32();

        Ok(Self {
            ssrc,
            fraction_lost: (loss >> 24) as u8,
            cumulative_lost: loss & 0x00FF_FFFF,
            highest_seq: buf.get_u32(),
            jitter: buf.get_u32(),
            last_sr: buf.get_u32(),
            delay_since_last_sr: buf.get_u32(),
        })
    }

    /// Encode one block; cumulative loss is clamped to 24 bits
    pub fn serialize(&self, buf: &mut BytesMut) {
        buf.reserve(Self::SIZE);
        buf.put_u32(self.ssrc);
        buf.put_u32(
            (self.fraction_lost as u32) << 24 | self.cumulative_lost.min(0x00FF_FFFF),
        );
        buf.put_u32(self.highest_seq);
        buf.put_u32(self.jitter);
        buf.put_u32(self.last_sr);
        buf.put_u32(self.delay_since_last_sr);
    }
}

pub(crate) fn parse_blocks(buf: &mut impl Buf, count: u8) -> Result<Vec<RtcpReportBlock>> {
    (0..count).map(|_| RtcpReportBlock::parse(buf)).collect()
}
