//! Frame sequence gap observer

/// Tracks consecutive frame sequence numbers and reports how many frames
/// were skipped between two observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sequence {
    sequence: Option<u32>,
}

impl Sequence {
    pub const fn new() -> Self {
        Self { sequence: None }
    }

    /// Records `seq` and returns the number of frames missing since the
    /// previous observation. The first observation after creation or
    /// [`reset`](Self::reset) never reports drift. Going backwards yields a
    /// negative value. Wrapping of the 32-bit counter is handled.
    #[must_use]
    pub fn update(&mut self, seq: u32) -> i32 {
        let previous = self.sequence.unwrap_or(seq.wrapping_sub(1));
        self.sequence = Some(seq);

        seq.wrapping_sub(previous).wrapping_sub(1) as i32
    }

    pub fn reset(&mut self) {
        self.sequence = None;
    }

    pub fn last(&self) -> Option<u32> {
        self.sequence
    }
}
