/// One `{offset, time}` entry of a [`TimestampIndex`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimestampSample {
    /// Bit offset into the consumer's buffer where the unit starts.
    pub bit_offset: usize,
    /// Presentation time of the unit, in seconds.
    pub time: f64,
}

/// Ordered mapping from playback time to buffer bit offset.
///
/// Samples are appended as units are written, so both offsets and times are
/// non-decreasing. The index also remembers which sample the consumer is
/// currently positioned at.
#[derive(Debug, Clone, Default)]
pub struct TimestampIndex {
    samples: Vec<TimestampSample>,
    current: usize,
}

impl TimestampIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bit_offset: usize, time: f64) {
        self.samples.push(TimestampSample { bit_offset, time });
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[TimestampSample] {
        &self.samples
    }

    /// Position of the sample the consumer is currently synced to.
    pub fn current(&self) -> usize {
        self.current
    }

    /// Finds the last sample with `time <= target` and makes it current.
    ///
    /// Returns `None`, and rewinds to the first sample, when every sample is
    /// later than `target` or the index is empty.
    pub fn seek(&mut self, target: f64) -> Option<TimestampSample> {
        let n = self.samples.partition_point(|s| s.time <= target);
        if n == 0 {
            self.current = 0;
            return None;
        }
        self.current = n - 1;
        Some(self.samples[self.current])
    }

    /// Moves to the newest sample at or behind `read_offset`, if that is a
    /// later sample than the current one.
    pub fn advance(&mut self, read_offset: usize) -> Option<TimestampSample> {
        let tail = self.samples.get(self.current..)?;
        let passed = tail.partition_point(|s| s.bit_offset <= read_offset);
        if passed < 2 {
            return None;
        }
        self.current += passed - 1;
        Some(self.samples[self.current])
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.current = 0;
    }
}
