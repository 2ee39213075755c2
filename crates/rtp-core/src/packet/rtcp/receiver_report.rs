use bytes::{Buf, BufMut, BytesMut};

use super::report_block::{parse_blocks, RtcpReportBlock};
use crate::error::Error;
use crate::{Result, RtpSsrc};

/// RTCP Receiver Report (RR)
/// Defined in RFC 3550 Section 6.4.2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcpReceiverReport {
    /// Reporter SSRC
    pub ssrc: RtpSsrc,

    /// Up to 31 reception report blocks
    pub report_blocks: Vec<RtcpReportBlock>,
}

impl RtcpReceiverReport {
    /// Create a report with no blocks
    pub fn new(ssrc: RtpSsrc) -> Self {
        Self {
            ssrc,
            report_blocks: Vec::new(),
        }
    }

    /// Append a report block
    pub fn add_report_block(&mut self, block: RtcpReportBlock) {
        self.report_blocks.push(block);
    }

    /// Body size, excluding the common header
    pub fn size(&self) -> usize {
        4 + self.report_blocks.len() * RtcpReportBlock::SIZE
    }

    pub(crate) fn parse_body(buf: &mut impl Buf, count: u8) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(Error::BufferTooSmall {
                required: 4,
                available: buf.remaining(),
            });
        }
        let ssrc = buf.get_u32();
        let report_blocks = parse_blocks(buf, count)?;
        Ok(Self {
            ssrc,
            report_blocks,
        })
    }

    pub(crate) fn serialize_body(&self, buf: &mut BytesMut) {
        buf.put_u32(self.ssrc);
        for block in &self.report_blocks {
            block.serialize(buf);
        }
    }
}
