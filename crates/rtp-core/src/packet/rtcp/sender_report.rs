use bytes::{Buf, BufMut, BytesMut};

use super::ntp::NtpTimestamp;
use super::report_block::{parse_blocks, RtcpReportBlock};
use crate::error::Error;
use crate::{Result, RtpSsrc, RtpTimestamp};

/// RTCP Sender Report (SR)
/// Defined in RFC 3550 Section 6.4.1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcpSenderReport {
    /// Sender SSRC
    pub ssrc: RtpSsrc,

    /// Wall clock time of this report
    pub ntp_timestamp: NtpTimestamp,

    /// RTP timestamp corresponding to `ntp_timestamp`
    pub rtp_timestamp: RtpTimestamp,

    /// Packets sent since the stream started
    pub packet_count: u32,

    /// Payload octets sent since the stream started
    pub octet_count: u32,

    /// Reception report blocks
    pub report_blocks: Vec<RtcpReportBlock>,
}

impl RtcpSenderReport {
    /// Fixed part of the body: SSRC + sender info
    const SENDER_INFO_SIZE: usize = 24;

    /// Create a report with no blocks
    pub fn new(
        ssrc: RtpSsrc,
        ntp_timestamp: NtpTimestamp,
        rtp_timestamp: RtpTimestamp,
        packet_count: u32,
        octet_count: u32,
    ) -> Self {
        Self {
            ssrc,
            ntp_timestamp,
            rtp_timestamp,
            packet_count,
            octet_count,
            report_blocks: Vec::new(),
        }
    }

    /// Body size, excluding the common header
    pub fn size(&self) -> usize {
        Self::SENDER_INFO_SIZE + self.report_blocks.len() * RtcpReportBlock::SIZE
    }

    pub(crate) fn parse_body(buf: &mut impl Buf, count: u8) -> Result<Self> {
        if buf.remaining() < Self::SENDER_INFO_SIZE {
            return Err(Error::BufferTooSmall {
                required: Self::SENDER_INFO_SIZE,
                available: buf.remaining(),
            });
        }

        let ssrc = buf.get_u32();
        let ntp_timestamp = NtpTimestamp::from_u64(buf.get_u64());
        let rtp_timestamp = buf.get_u32();
        let packet_count = buf.get_u32();
        let octet_count = buf.get_u32();
        let report_blocks = parse_blocks(buf, count)?;

        Ok(Self {
            ssrc,
            ntp_timestamp,
            rtp_timestamp,
            packet_count,
            octet_count,
            report_blocks,
        })
    }

    pub(crate) fn serialize_body(&self, buf: &mut BytesMut) {
        buf.put_u32(self.ssrc);
        buf.put_u64(self.ntp_timestamp.to_u64());
        buf.put_u32(self.rtp_timestamp);
        buf.put_u32(self.packet_count);
        buf.put_u32(self.octet_count);
        for block in &self.report_blocks {
            block.serialize(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_info_layout() {
        let ntp = NtpTimestamp {
            seconds: 0xAABBCCDD,
            fraction: 0x11223344,
        };
        let sr = RtcpSenderReport::new(0x01020304, ntp, 160, 10, 1600);

        let mut buf = BytesMut::new();
        sr.serialize_body(&mut buf);
        assert_eq!(buf.len(), 24);
        assert_eq!(&buf[4..12], &[0xAA, 0xBB, 0xCC, 0xDD, 0x11, 0x22, 0x33, 0x44]);

        let parsed = RtcpSenderReport::parse_body(&mut buf.freeze(), 0).unwrap();
        assert_eq!(parsed, sr);
    }

    #[test]
    fn test_with_report_block() {
        let mut sr = RtcpSenderReport::new(1, NtpTimestamp::default(), 0, 0, 0);
        sr.report_blocks.push(RtcpReportBlock::new(2));
        assert_eq!(sr.size(), 48);

        let mut buf = BytesMut::new();
        sr.serialize_body(&mut buf);
        let parsed = RtcpSenderReport::parse_body(&mut buf.freeze(), 1).unwrap();
        assert_eq!(parsed.report_blocks[0].ssrc, 2);
    }
}
