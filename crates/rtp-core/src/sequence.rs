//! Sequence number handling
//!
//! [`ExtendedSequenceNumber`] widens the 16-bit wire sequence number of one
//! remote source into a 64-bit counter by counting wrap cycles. It assumes no
//! more than one wrap between consecutive observations; a step of more than
//! half the sequence space in the forward direction is therefore treated as a
//! late packet from the previous cycle and reported as a regression.
//!
//! [`RtpSequencer`] produces outbound sequence numbers.

use crate::error::Error;
use crate::{Result, RtpSequenceNumber};

const SEQ_SPACE: u64 = 1 << 16;
const HALF_SEQ_SPACE: u16 = 1 << 15;

/// Wrap-aware extended sequence counter for a single source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtendedSequenceNumber {
    cycles: u64,
    last_seq: RtpSequenceNumber,
}

impl ExtendedSequenceNumber {
    /// Tracker starting at `seq`
    pub fn new(seq: RtpSequenceNumber) -> Self {
        Self {
            cycles: 0,
            last_seq: seq,
        }
    }

    /// Restart tracking from `seq` with a zero cycle count
    pub fn init(&mut self, seq: RtpSequenceNumber) {
        self.cycles = 0;
        self.last_seq = seq;
    }

    /// Feed the next observed sequence number
    ///
    /// A backward step larger than half the sequence space counts as a forward
    /// wrap. A forward step larger than half the space can only be a packet
    /// from before the last wrap: it is rejected with
    /// [`Error::SequenceRegression`] and the tracker is left unchanged.
    /// Small backward steps (reordering) just move `last_seq`.
    pub fn update(&mut self, seq: RtpSequenceNumber) -> Result<()> {
        let last = self.last_seq;

        if seq < last && last - seq > HALF_SEQ_SPACE {
            self.cycles += 1;
        } else if seq > last && seq - last > HALF_SEQ_SPACE {
            return Err(Error::SequenceRegression {
                last,
                received: seq,
            });
        }

        self.last_seq = seq;
        Ok(())
    }

    /// `cycles * 65536 + last_seq`
    pub fn extended(&self) -> u64 {
        self.cycles * SEQ_SPACE + self.last_seq as u64
    }

    /// Number of observed wraps
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Last accepted raw sequence number
    pub fn last_seq(&self) -> RtpSequenceNumber {
        self.last_seq
    }
}

/// Outbound sequence number generator starting at a random value
#[derive(Debug, Clone)]
pub struct RtpSequencer {
    next: RtpSequenceNumber,
}

impl RtpSequencer {
    /// Sequencer with a random initial sequence number
    pub fn new() -> Self {
        Self::starting_at(rand::random())
    }

    /// Sequencer with a fixed initial sequence number
    pub fn starting_at(initial: RtpSequenceNumber) -> Self {
        Self { next: initial }
    }

    /// Return the current value and advance, wrapping at 65536
    pub fn next_seq(&mut self) -> RtpSequenceNumber {
        let seq = self.next;
        self.next = self.next.wrapping_add(1);
        seq
    }

    /// Value the next call to [`next_seq`](Self::next_seq) returns
    pub fn peek(&self) -> RtpSequenceNumber {
        self.next
    }
}

impl Default for RtpSequencer {
    fn default() -> Self {
        Self::new()
    }
}
