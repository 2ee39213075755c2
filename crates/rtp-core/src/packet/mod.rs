//! RTP and RTCP packet formats

mod header;
pub mod rtcp;

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::Error;
use crate::Result;

pub use header::{RtpHeader, RtpHeaderExtension};

/// An RTP packet: header plus payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    /// Packet header
    pub header: RtpHeader,

    /// Payload with any padding removed
    pub payload: Bytes,
}

impl RtpPacket {
    /// Create a new packet
    pub fn new(header: RtpHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Serialized size in bytes
    pub fn size(&self) -> usize {
        self.header.size() + self.payload.len()
    }

    /// Parse a packet from a datagram, copying it
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::from_bytes(Bytes::copy_from_slice(data))
    }

    /// Parse a packet from an owned buffer without copying the payload
    pub fn from_bytes(mut data: Bytes) -> Result<Self> {
        let header = RtpHeader::parse(&mut data)?;
        let mut payload = data;

        if header.padding {
            let pad = match payload.last() {
                Some(&pad) => pad as usize,
                None => {
                    return Err(Error::InvalidPacket(
                        "padding flag set on empty payload".to_string(),
                    ))
                }
            };
            if pad == 0 || pad > payload.len() {
                return Err(Error::InvalidPacket(format!(
                    "invalid padding length {} for payload of {} bytes",
                    pad,
                    payload.len()
                )));
            }
            payload.truncate(payload.len() - pad);
        }

        Ok(Self { header, payload })
    }

    /// Serialize the packet
    pub fn serialize(&self) -> Result<BytesMut> {
        let mut buf = BytesMut::with_capacity(self.size());
        self.header.serialize(&mut buf)?;
        buf.put_slice(&self.payload);
        Ok(buf)
    }
}

impl fmt::Display for RtpPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header)?;
        write!(f, "\tPayload Length: {}", self.payload.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_serialize_parse() {
        let mut header = RtpHeader::new(0, 65535, 160, 0x11223344);
        header.marker = true;
        let packet = RtpPacket::new(header, Bytes::from_static(b"\xff\x7f\x00\x80"));

        let data = packet.serialize().unwrap();
        assert_eq!(data.len(), 16);

        let parsed = RtpPacket::parse(&data).unwrap();
        assert_eq!(parsed, packet);
    }

    #[test]
    fn test_padding_is_stripped() {
        // P=1, 2 payload bytes followed by 2 bytes of padding
        let data = [
            0xA0u8, 0, 0, 7, 0, 0, 0, 0, 0, 0, 0, 1, 0xAA, 0xBB, 0x00, 0x02,
        ];
        let packet = RtpPacket::parse(&data).unwrap();
        assert!(packet.header.padding);
        assert_eq!(&packet.payload[..], &[0xAA, 0xBB]);
    }

    #[test]
    fn test_invalid_padding_rejected() {
        let data = [0xA0u8, 0, 0, 7, 0, 0, 0, 0, 0, 0, 0, 1, 0xAA, 0x09];
        assert!(matches!(
            RtpPacket::parse(&data),
            Err(Error::InvalidPacket(_))
        ));
    }

    #[test]
    fn test_empty_payload() {
        let packet = RtpPacket::new(RtpHeader::new(8, 1, 2, 3), Bytes::new());
        let parsed = RtpPacket::parse(&packet.serialize().unwrap()).unwrap();
        assert!(parsed.payload.is_empty());
    }
}
