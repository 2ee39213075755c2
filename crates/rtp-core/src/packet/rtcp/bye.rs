use bytes::{Buf, BufMut, BytesMut};

use crate::error::Error;
use crate::{Result, RtpSsrc};

/// RTCP Goodbye (BYE)
/// Defined in RFC 3550 Section 6.6
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RtcpGoodbye {
    /// Sources leaving the session
    pub sources: Vec<RtpSsrc>,

    /// Optional reason, truncated to 255 bytes on the wire
    pub reason: Option<String>,
}

impl RtcpGoodbye {
    /// BYE for a single source
    pub fn new(ssrc: RtpSsrc) -> Self {
        Self {
            sources: vec![ssrc],
            reason: None,
        }
    }

    /// BYE for a single source with a reason
    pub fn with_reason(ssrc: RtpSsrc, reason: impl Into<String>) -> Self {
        Self {
            sources: vec![ssrc],
            reason: Some(reason.into()),
        }
    }

    fn reason_len(&self) -> Option<usize> {
        self.reason.as_ref().map(|r| r.len().min(255))
    }

    /// Body size including reason padding, excluding the common header
    pub fn size(&self) -> usize {
        let reason = self
            .reason_len()
            .map(|len| (1 + len + 3) & !3)
            .unwrap_or(0);
        self.sources.len() * 4 + reason
    }

    pub(crate) fn parse_body(buf: &mut impl Buf, count: u8) -> Result<Self> {
        let needed = count as usize * 4;
        if buf.remaining() < needed {
            return Err(Error::BufferTooSmall {
                required: needed,
                available: buf.remaining(),
            });
        }
        let sources = (0..count).map(|_| buf.get_u32()).collect();

        let reason = if buf.has_remaining() {
            let len = buf.get_u8() as usize;
            if buf.remaining() < len {
                return Err(Error::BufferTooSmall {
                    required: len,
                    available: buf.remaining(),
                });
            }
            let text = buf.copy_to_bytes(len);
            // Trailing zero padding up to the 32-bit boundary
            buf.advance(buf.remaining());
            Some(String::from_utf8_lossy(&text).into_owned())
        } else {
            None
        };

        Ok(Self { sources, reason })
    }

    pub(crate) fn serialize_body(&self, buf: &mut BytesMut) {
        for ssrc in &self.sources {
            buf.put_u32(*ssrc);
        }

        if let (Some(reason), Some(len)) = (&self.reason, self.reason_len()) {
            buf.put_u8(len as u8);
            buf.put_slice(&reason.as_bytes()[..len]);
            let padding = (4 - (1 + len) % 4) % 4;
            buf.put_bytes(0, padding);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_with_reason_padding() {
        assert_eq!(RtcpGoodbye::default().size(), 0);
        assert_eq!(RtcpGoodbye::new(1).size(), 4);
        // 4 + len byte + "Bye" = 8
        assert_eq!(RtcpGoodbye::with_reason(1, "Bye").size(), 8);
        // 4 + 1 + 7 = 12
        assert_eq!(RtcpGoodbye::with_reason(1, "Goodbye").size(), 12);
        // 4 + 1 + 1 + 2 padding = 8
        assert_eq!(RtcpGoodbye::with_reason(1, "A").size(), 8);
    }

    #[test]
    fn test_body_serialize_parse() {
        let mut bye = RtcpGoodbye::with_reason(0x12345678, "call ended");
        bye.sources.push(0xabcdef01);

        let mut buf = BytesMut::new();
        bye.serialize_body(&mut buf);
        assert_eq!(buf.len(), bye.size());
        assert_eq!(buf.len() % 4, 0);

        let parsed = RtcpGoodbye::parse_body(&mut buf.freeze(), 2).unwrap();
        assert_eq!(parsed, bye);
    }

    #[test]
    fn test_long_reason_truncated() {
        let bye = RtcpGoodbye::with_reason(7, "x".repeat(300));
        let mut buf = BytesMut::new();
        bye.serialize_body(&mut buf);

        let parsed = RtcpGoodbye::parse_body(&mut buf.freeze(), 1).unwrap();
        assert_eq!(parsed.reason.map(|r| r.len()), Some(255));
    }
}
