//! RTP clock conversions
//!
//! RTP timestamps count media samples at the payload's clock rate. These
//! helpers translate between wall-clock durations and timestamp increments.

use std::time::Duration;

use crate::RtpTimestamp;

/// Convert an RTP timestamp increment to a duration at `clock_rate`
pub fn rtp_timestamp_to_duration(timestamp: RtpTimestamp, clock_rate: u32) -> Duration {
    if clock_rate == 0 {
        return Duration::ZERO;
    }

    let seconds = timestamp / clock_rate;
    let remainder = timestamp % clock_rate;
    let nanos = (remainder as u64 * 1_000_000_000) / clock_rate as u64;

    Duration::new(seconds as u64, nanos as u32)
}

/// Convert a duration to an RTP timestamp increment at `clock_rate`
///
/// Sub-sample remainders are truncated. The result wraps like the wire field.
pub fn duration_to_rtp_timestamp(duration: Duration, clock_rate: u32) -> RtpTimestamp {
    let samples = duration.as_nanos() * clock_rate as u128 / 1_000_000_000;
    samples as RtpTimestamp
}

/// Samples covered by one packet of `ptime`
///
/// `8000 Hz * 20 ms = 160`
pub fn samples_per_packet(clock_rate: u32, ptime: Duration) -> RtpTimestamp {
    duration_to_rtp_timestamp(ptime, clock_rate)
}

/// Forward distance from `from` to `to`, modulo 2^32
pub fn rtp_timestamp_diff(from: RtpTimestamp, to: RtpTimestamp) -> RtpTimestamp {
    to.wrapping_sub(from)
}

/// Clock rates of the audio payloads the media layer knows about
pub mod clock_rates {
    /// G.711 and telephone-event
    pub const AUDIO_8KHZ: u32 = 8000;

    /// Wideband audio
    pub const AUDIO_16KHZ: u32 = 16000;

    /// Opus
    pub const AUDIO_48KHZ: u32 = 48000;
}
