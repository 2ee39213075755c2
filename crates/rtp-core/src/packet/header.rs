use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::Error;
use crate::{Result, RtpSequenceNumber, RtpSsrc, RtpTimestamp, RTP_VERSION};

/// RTP header extension (RFC 3550 Section 5.3.1)
///
/// Only carried through; the transport never interprets extension content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeaderExtension {
    /// Profile-defined identifier
    pub profile: u16,

    /// Extension body, a multiple of 4 bytes
    pub data: Bytes,
}

/// RTP fixed header plus optional CSRC list and extension
/// Defined in RFC 3550 Section 5.1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeader {
    /// Protocol version, always 2
    pub version: u8,

    /// Padding flag as seen on the wire. Padding is stripped on parse and
    /// never emitted on serialize.
    pub padding: bool,

    /// Marker bit
    pub marker: bool,

    /// Payload type (7 bits)
    pub payload_type: u8,

    /// Sequence number
    pub sequence_number: RtpSequenceNumber,

    /// Media timestamp
    pub timestamp: RtpTimestamp,

    /// Synchronization source
    pub ssrc: RtpSsrc,

    /// Contributing sources
    pub csrc: Vec<RtpSsrc>,

    /// Header extension, if the X bit was set
    pub extension: Option<RtpHeaderExtension>,
}

impl RtpHeader {
    /// Size of the fixed part of the header
    pub const FIXED_SIZE: usize = 12;

    /// Create a plain version 2 header with no CSRCs and no extension
    pub fn new(
        payload_type: u8,
        sequence_number: RtpSequenceNumber,
        timestamp: RtpTimestamp,
        ssrc: RtpSsrc,
    ) -> Self {
        Self {
            version: RTP_VERSION,
            padding: false,
            marker: false,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrc: Vec::new(),
            extension: None,
        }
    }

    /// Header size in bytes when serialized
    pub fn size(&self) -> usize {
        let ext = self
            .extension
            .as_ref()
            .map(|e| 4 + e.data.len())
            .unwrap_or(0);
        Self::FIXED_SIZE + self.csrc.len() * 4 + ext
    }

    /// Parse a header, leaving `buf` positioned at the start of the payload
    pub fn parse(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < Self::FIXED_SIZE {
            return Err(Error::BufferTooSmall {
                required: Self::FIXED_SIZE,
                available: buf.remaining(),
            });
        }

        // V(2) P(1) X(1) CC(4)
        let first = buf.get_u8();
        let version = first >> 6;
        if version != RTP_VERSION {
            return Err(Error::InvalidVersion(version));
        }
        let padding = first & 0x20 != 0;
        let has_extension = first & 0x10 != 0;
        let csrc_count = (first & 0x0F) as usize;

        // M(1) PT(7)
        let second = buf.get_u8();
        let marker = second & 0x80 != 0;
        let payload_type = second & 0x7F;

        let sequence_number = buf.get_u16();
        let timestamp = buf.get_u32();
        let ssrc = buf.get_u32();

        if buf.remaining() < csrc_count * 4 {
            return Err(Error::BufferTooSmall {
                required: csrc_count * 4,
                available: buf.remaining(),
            });
        }
        let csrc = (0..csrc_count).map(|_| buf.get_u32()).collect();

        let extension = if has_extension {
            if buf.remaining() < 4 {
                return Err(Error::BufferTooSmall {
                    required: 4,
                    available: buf.remaining(),
                });
            }
            let profile = buf.get_u16();
            let len = buf.get_u16() as usize * 4;
            if buf.remaining() < len {
                return Err(Error::BufferTooSmall {
                    required: len,
                    available: buf.remaining(),
                });
            }
            let data = buf.copy_to_bytes(len);
            Some(RtpHeaderExtension { profile, data })
        } else {
            None
        };

        Ok(Self {
            version,
            padding,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrc,
            extension,
        })
    }

    /// Serialize the header into `buf`
    pub fn serialize(&self, buf: &mut BytesMut) -> Result<()> {
        if self.csrc.len() > 15 {
            return Err(Error::InvalidPacket(format!(
                "too many CSRC entries: {}",
                self.csrc.len()
            )));
        }
        if self.payload_type > 0x7F {
            return Err(Error::InvalidPacket(format!(
                "payload type {} does not fit in 7 bits",
                self.payload_type
            )));
        }

        if let Some(ext) = &self.extension {
            if ext.data.len() % 4 != 0 || ext.data.len() / 4 > u16::MAX as usize {
                return Err(Error::InvalidPacket(format!(
                    "invalid header extension length {}",
                    ext.data.len()
                )));
            }
        }

        buf.reserve(self.size());

        let mut first = (self.version & 0x03) << 6;
        if self.extension.is_some() {
            first |= 0x10;
        }
        first |= self.csrc.len() as u8;
        buf.put_u8(first);

        let mut second = self.payload_type;
        if self.marker {
            second |= 0x80;
        }
        buf.put_u8(second);

        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);

        for csrc in &self.csrc {
            buf.put_u32(*csrc);
        }

        if let Some(ext) = &self.extension {
            buf.put_u16(ext.profile);
            buf.put_u16((ext.data.len() / 4) as u16);
            buf.put_slice(&ext.data);
        }

        Ok(())
    }
}

impl fmt::Display for RtpHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RTP Header:")?;
        writeln!(f, "\tVersion: {}", self.version)?;
        writeln!(f, "\tMarker: {}", self.marker)?;
        writeln!(f, "\tPayload Type: {}", self.payload_type)?;
        writeln!(f, "\tSequence Number: {}", self.sequence_number)?;
        writeln!(f, "\tTimestamp: {}", self.timestamp)?;
        write!(f, "\tSSRC: {} ({:#010x})", self.ssrc, self.ssrc)
    }
}
