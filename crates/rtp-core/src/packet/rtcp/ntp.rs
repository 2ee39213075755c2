use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds between the NTP epoch (1900) and the UNIX epoch (1970)
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// 64-bit NTP timestamp as used in sender reports (RFC 3550 Section 4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NtpTimestamp {
    /// Seconds since 1900-01-01
    pub seconds: u32,

    /// Fractional second in units of 2^-32
    pub fraction: u32,
}

impl NtpTimestamp {
    /// Timestamp for the current wall clock
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Convert a wall-clock instant; times before 1970 map to the UNIX epoch
    pub fn from_system_time(time: SystemTime) -> Self {
        let since_unix = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        Self::from_unix_duration(since_unix)
    }

    /// Convert a duration since the UNIX epoch
    pub fn from_unix_duration(duration: Duration) -> Self {
        let fraction = ((duration.subsec_nanos() as u64) << 32) / 1_000_000_000;
        Self {
            seconds: (duration.as_secs() + NTP_UNIX_OFFSET) as u32,
            fraction: fraction as u32,
        }
    }

    /// Duration since the UNIX epoch; zero for timestamps before 1970
    pub fn to_unix_duration(&self) -> Duration {
        let seconds = (self.seconds as u64).saturating_sub(NTP_UNIX_OFFSET);
        let nanos = ((self.fraction as u64) * 1_000_000_000) >> 32;
        Duration::new(seconds, nanos as u32)
    }

    /// Full 64-bit wire value
    pub fn to_u64(&self) -> u64 {
        (self.seconds as u64) << 32 | self.fraction as u64
    }

    /// Build from the 64-bit wire value
    pub fn from_u64(value: u64) -> Self {
        Self {
            seconds: (value >> 32) as u32,
            fraction: value as u32,
        }
    }

    /// Middle 32 bits, the form echoed back in the LSR field of report blocks
    pub fn compact(&self) -> u32 {
        (self.seconds << 16) | (self.fraction >> 16)
    }
}
