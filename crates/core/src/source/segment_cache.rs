use std::collections::VecDeque;

use crate::decode::domain::segment::Segment;

/// Result of a cache lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup {
    /// Index of the segment containing the target offset.
    Found(usize),
    /// The target is not covered yet, or the match sits too close to the
    /// tail to read from without decoding further first.
    NeedsRefill,
}

/// Bounded, ordered collection of decoded PCM segments.
///
/// Segments arrive from the decoder in strictly increasing, contiguous
/// order, are appended at the tail and evicted from the head, FIFO. The
/// covered sample range is `[window_start, window_end)`; both bounds are
/// recomputed on every mutation.
pub struct SegmentCache {
    segments: VecDeque<Segment>,
    window_start: u64,
    window_end: u64,
    max_segments: usize,
    headroom: usize,
}

impl SegmentCache {
    pub fn new(max_segments: usize, headroom: usize) -> Self {
        assert!(headroom < max_segments);
        Self {
            segments: VecDeque::new(),
            window_start: 0,
            window_end: 0,
            max_segments,
            headroom,
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// First cached sample offset; 0 when empty.
    pub fn window_start(&self) -> u64 {
        self.window_start
    }

    /// One past the last cached sample offset; 0 when empty.
    pub fn window_end(&self) -> u64 {
        self.window_end
    }

    pub fn headroom(&self) -> usize {
        self.headroom
    }

    pub fn segment(&self, index: usize) -> &Segment {
        &self.segments[index]
    }

    /// Appends a segment at the tail, evicting the head first whenever the
    /// cache already stands at its soft limit.
    pub fn append(&mut self, segment: Segment) {
        if self.segments.len() >= self.max_segments - self.headroom {
            self.segments.pop_front();
        }
        self.segments.push_back(segment);
        self.recompute_window();
    }

    /// Evicts everything. Part of the hard-reset path together with the
    /// decoder's seek to origin, which resets the running decode cursor.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.recompute_window();
    }

    /// Locates the segment containing `target`, scanning backward from
    /// `hint` toward the head and correcting forward when the hint is stale.
    ///
    /// Signals [`Lookup::NeedsRefill`] when the target lies beyond the
    /// cached window, and also when the match sits within `tail_margin`
    /// segments of the tail; callers pass 0 there once the stream is known
    /// to be exhausted.
    pub fn lookup(&self, hint: usize, target: u64, tail_margin: usize) -> Lookup {
        if self.segments.is_empty() || target >= self.window_end {
            return Lookup::NeedsRefill;
        }
        let last = self.segments.len() - 1;
        let mut pos = hint.min(last);
        // Walk toward the head until the segment range reaches back to the
        // target. Bounded at index 0; a target below the window never
        // resolves and is the caller's contract violation to surface.
        while pos > 0 && self.segments[pos].start_offset() > target {
            pos -= 1;
        }
        while pos < last && self.segments[pos].end_offset() <= target {
            pos += 1;
        }
        if !self.segments[pos].contains(target) {
            return Lookup::NeedsRefill;
        }
        if self.segments.len() - pos <= tail_margin {
            return Lookup::NeedsRefill;
        }
        Lookup::Found(pos)
    }

    fn recompute_window(&mut self) {
        match (self.segments.front(), self.segments.back()) {
            (Some(first), Some(last)) => {
                self.window_start = first.start_offset();
                self.window_end = last.end_offset();
            }
            _ => {
                self.window_start = 0;
                self.window_end = 0;
            }
        }
    }
}
