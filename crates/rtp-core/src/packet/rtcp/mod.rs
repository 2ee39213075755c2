//! RTCP framing
//!
//! The transport does not act on RTCP content. Sender reports, receiver
//! reports and BYE are decoded into structures so applications can read and
//! build them; every other packet type is carried through untouched as
//! [`RtcpRawPacket`]. Compound datagrams are split into individual packets.

mod bye;
mod ntp;
mod receiver_report;
mod report_block;
mod sender_report;

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::error::Error;
use crate::{Result, RTP_VERSION};

pub use bye::RtcpGoodbye;
pub use ntp::NtpTimestamp;
pub use receiver_report::RtcpReceiverReport;
pub use report_block::RtcpReportBlock;
pub use sender_report::RtcpSenderReport;

/// Sender report packet type
pub const RTCP_SR: u8 = 200;
/// Receiver report packet type
pub const RTCP_RR: u8 = 201;
/// Source description packet type
pub const RTCP_SDES: u8 = 202;
/// Goodbye packet type
pub const RTCP_BYE: u8 = 203;
/// Application-defined packet type
pub const RTCP_APP: u8 = 204;

/// Size of the common RTCP header
pub const RTCP_HEADER_SIZE: usize = 4;

/// Maximum value of the 5-bit count field
const MAX_COUNT: usize = 31;

/// An RTCP packet type the transport does not decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcpRawPacket {
    /// Packet type field
    pub packet_type: u8,

    /// 5-bit count / subtype field
    pub count: u8,

    /// Body after the common header, padding removed
    pub body: Bytes,
}

/// A single RTCP packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtcpPacket {
    /// Sender report (200)
    SenderReport(RtcpSenderReport),
    /// Receiver report (201)
    ReceiverReport(RtcpReceiverReport),
    /// Goodbye (203)
    Goodbye(RtcpGoodbye),
    /// Anything else, passed through
    Unknown(RtcpRawPacket),
}

impl RtcpPacket {
    /// Packet type field for this packet
    pub fn packet_type(&self) -> u8 {
        match self {
            RtcpPacket::SenderReport(_) => RTCP_SR,
            RtcpPacket::ReceiverReport(_) => RTCP_RR,
            RtcpPacket::Goodbye(_) => RTCP_BYE,
            RtcpPacket::Unknown(raw) => raw.packet_type,
        }
    }

    fn count(&self) -> usize {
        match self {
            RtcpPacket::SenderReport(sr) => sr.report_blocks.len(),
            RtcpPacket::ReceiverReport(rr) => rr.report_blocks.len(),
            RtcpPacket::Goodbye(bye) => bye.sources.len(),
            RtcpPacket::Unknown(raw) => raw.count as usize,
        }
    }

    /// Serialize this packet with its common header
    pub fn serialize(&self) -> Result<BytesMut> {
        let mut buf = BytesMut::new();
        self.serialize_into(&mut buf)?;
        Ok(buf)
    }

    fn serialize_into(&self, buf: &mut BytesMut) -> Result<()> {
        let count = self.count();
        if count > MAX_COUNT {
            return Err(Error::InvalidPacket(format!(
                "RTCP count {} exceeds {}",
                count, MAX_COUNT
            )));
        }

        let mut body = BytesMut::new();
        match self {
            RtcpPacket::SenderReport(sr) => sr.serialize_body(&mut body),
            RtcpPacket::ReceiverReport(rr) => rr.serialize_body(&mut body),
            RtcpPacket::Goodbye(bye) => bye.serialize_body(&mut body),
            RtcpPacket::Unknown(raw) => body.put_slice(&raw.body),
        }

        // Pass-through bodies are not guaranteed to be word aligned
        let padding = (4 - body.len() % 4) % 4;
        body.put_bytes(0, padding);

        let words = (RTCP_HEADER_SIZE + body.len()) / 4 - 1;
        if words > u16::MAX as usize {
            return Err(Error::InvalidPacket(format!(
                "RTCP packet too large: {} bytes",
                body.len()
            )));
        }

        buf.reserve(RTCP_HEADER_SIZE + body.len());
        buf.put_u8(RTP_VERSION << 6 | count as u8);
        buf.put_u8(self.packet_type());
        buf.put_u16(words as u16);
        buf.put_slice(&body);
        Ok(())
    }

    /// Serialize several packets into one compound datagram
    pub fn serialize_compound(packets: &[RtcpPacket]) -> Result<BytesMut> {
        let mut buf = BytesMut::new();
        for packet in packets {
            packet.serialize_into(&mut buf)?;
        }
        Ok(buf)
    }

    /// Parse every packet in a (possibly compound) datagram
    pub fn parse_compound(data: &[u8]) -> Result<Vec<RtcpPacket>> {
        let mut buf = Bytes::copy_from_slice(data);
        let mut packets = Vec::new();

        while buf.has_remaining() {
            packets.push(Self::parse_one(&mut buf)?);
        }

        if packets.is_empty() {
            return Err(Error::InvalidPacket("empty RTCP datagram".to_string()));
        }
        Ok(packets)
    }

    fn parse_one(buf: &mut Bytes) -> Result<RtcpPacket> {
        if buf.remaining() < RTCP_HEADER_SIZE {
            return Err(Error::BufferTooSmall {
                required: RTCP_HEADER_SIZE,
                available: buf.remaining(),
            });
        }

        let first = buf[0];
        let version = first >> 6;
        if version != RTP_VERSION {
            return Err(Error::InvalidVersion(version));
        }
        let padding = first & 0x20 != 0;
        let count = first & 0x1F;
        let packet_type = buf[1];
        let total = (u16::from_be_bytes([buf[2], buf[3]]) as usize + 1) * 4;

        if buf.remaining() < total {
            return Err(Error::BufferTooSmall {
                required: total,
                available: buf.remaining(),
            });
        }

        let mut body = buf.split_to(total);
        body.advance(RTCP_HEADER_SIZE);

        if padding {
            let pad = body.last().copied().unwrap_or(0) as usize;
            if pad == 0 || pad > body.len() {
                return Err(Error::InvalidPacket(format!(
                    "invalid RTCP padding length {}",
                    pad
                )));
            }
            body.truncate(body.len() - pad);
        }

        let packet = match packet_type {
            RTCP_SR => RtcpPacket::SenderReport(RtcpSenderReport::parse_body(&mut body, count)?),
            RTCP_RR => {
                RtcpPacket::ReceiverReport(RtcpReceiverReport::parse_body(&mut body, count)?)
            }
            RTCP_BYE => RtcpPacket::Goodbye(RtcpGoodbye::parse_body(&mut body, count)?),
            _ => {
                trace!("Passing through RTCP packet type {} ({} bytes)", packet_type, body.len());
                RtcpPacket::Unknown(RtcpRawPacket {
                    packet_type,
                    count,
                    body,
                })
            }
        };
        Ok(packet)
    }
}

impl fmt::Display for RtcpPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RtcpPacket::SenderReport(sr) => write!(
                f,
                "SenderReport from {:#010x}: ntp={}.{} rtp={} packets={} octets={} blocks={}",
                sr.ssrc,
                sr.ntp_timestamp.seconds,
                sr.ntp_timestamp.fraction,
                sr.rtp_timestamp,
                sr.packet_count,
                sr.octet_count,
                sr.report_blocks.len()
            ),
            RtcpPacket::ReceiverReport(rr) => write!(
                f,
                "ReceiverReport from {:#010x}: blocks={}",
                rr.ssrc,
                rr.report_blocks.len()
            ),
            RtcpPacket::Goodbye(bye) => {
                write!(f, "Goodbye sources={:x?} reason={:?}", bye.sources, bye.reason)
            }
            RtcpPacket::Unknown(raw) => write!(
                f,
                "RTCP type={} count={} body={} bytes",
                raw.packet_type,
                raw.count,
                raw.body.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receiver_report_header() {
        let mut rr = RtcpReceiverReport::new(0x12345678);
        rr.add_report_block(RtcpReportBlock::new(0xabcdef01));

        let data = RtcpPacket::ReceiverReport(rr).serialize().unwrap();
        assert_eq!(data.len(), 32);
        assert_eq!(data[0], 0x81); // V=2, RC=1
        assert_eq!(data[1], RTCP_RR);
        assert_eq!(u16::from_be_bytes([data[2], data[3]]), 7);
    }

    #[test]
    fn test_compound_round_trip() {
        let sr = RtcpSenderReport::new(
            0x11111111,
            NtpTimestamp {
                seconds: 1,
                fraction: 2,
            },
            3,
            4,
            5,
        );
        let packets = vec![
            RtcpPacket::SenderReport(sr),
            RtcpPacket::Goodbye(RtcpGoodbye::with_reason(0x11111111, "hangup")),
        ];

        let data = RtcpPacket::serialize_compound(&packets).unwrap();
        let parsed = RtcpPacket::parse_compound(&data).unwrap();
        assert_eq!(parsed, packets);
    }

    #[test]
    fn test_unknown_type_passthrough() {
        let sdes = RtcpPacket::Unknown(RtcpRawPacket {
            packet_type: RTCP_SDES,
            count: 1,
            body: Bytes::from_static(&[0, 0, 0, 1, 1, 3, b'a', b'b', b'c', 0, 0, 0]),
        });

        let data = sdes.serialize().unwrap();
        let parsed = RtcpPacket::parse_compound(&data).unwrap();
        assert_eq!(parsed, vec![sdes]);
    }

    #[test]
    fn test_unaligned_passthrough_is_padded() {
        let app = RtcpPacket::Unknown(RtcpRawPacket {
            packet_type: RTCP_APP,
            count: 0,
            body: Bytes::from_static(&[1, 2, 3, 4, 5]),
        });
        let data = app.serialize().unwrap();
        assert_eq!(data.len(), 12);
    }

    #[test]
    fn test_truncated_compound() {
        let data = RtcpPacket::Goodbye(RtcpGoodbye::new(9)).serialize().unwrap();
        let err = RtcpPacket::parse_compound(&data[..6]).unwrap_err();
        assert!(matches!(err, Error::BufferTooSmall { .. }));
    }

    #[test]
    fn test_empty_datagram() {
        assert!(RtcpPacket::parse_compound(&[]).is_err());
    }

    #[test]
    fn test_too_many_sources() {
        let bye = RtcpGoodbye {
            sources: (0..32).collect(),
            reason: None,
        };
        assert!(RtcpPacket::Goodbye(bye).serialize().is_err());
    }
}
