//! Beat cursor: which beat comes next and when it sounds.

/// Seconds between quarter-note beats at `bpm`.
#[inline]
pub fn seconds_per_beat(bpm: u32) -> f64 {
    60.0 / bpm.max(1) as f64
}

/// Rolling position of the lookahead scheduler.
///
/// `next_note_time` only moves forward while playing; it is rewound solely
/// by [`BeatCursor::reset`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatCursor {
    beat_index: u32,
    next_note_time: f64,
}

impl BeatCursor {
    pub fn new(first_note_time: f64) -> Self {
        Self {
            beat_index: 0,
            next_note_time: first_note_time,
        }
    }

    /// Rewind to beat zero, first note at `first_note_time`.
    pub fn reset(&mut self, first_note_time: f64) {
        self.beat_index = 0;
        self.next_note_time = first_note_time;
    }

    pub fn beat_index(&self) -> u32 {
        self.beat_index
    }

    pub fn next_note_time(&self) -> f64 {
        self.next_note_time
    }

    /// Whether the next note falls before `horizon` and must be committed now.
    pub fn is_due(&self, horizon: f64) -> bool {
        self.next_note_time < horizon
    }

    /// Step past the current note.
    ///
    /// Tempo and bar length are read here, at advance time, so changes apply
    /// from the next interval on. A bar shrunk below the current index wraps
    /// straight to zero.
    pub fn advance(&mut self, bpm: u32, beats_per_bar: u32) {
        self.next_note_time += seconds_per_beat(bpm);
        self.beat_index += 1;
        if self.beat_index >= beats_per_bar {
            self.beat_index = 0;
        }
    }
}

impl Default for BeatCursor {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_per_beat() {
        assert_eq!(seconds_per_beat(120), 0.5);
        assert_eq!(seconds_per_beat(60), 1.0);
        assert!((seconds_per_beat(300) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_wraps_at_bar_length() {
        let mut cursor = BeatCursor::new(0.1);
        let mut indices = Vec::new();
        for _ in 0..6 {
            indices.push(cursor.beat_index());
            cursor.advance(120, 4);
        }
        assert_eq!(indices, [0, 1, 2, 3, 0, 1]);
        assert!((cursor.next_note_time() - 3.1).abs() < 1e-9);
    }

    #[test]
    fn test_single_beat_bar_stays_at_zero() {
        let mut cursor = BeatCursor::new(0.0);
        for _ in 0..3 {
            cursor.advance(60, 1);
            assert_eq!(cursor.beat_index(), 0);
        }
        assert_eq!(cursor.next_note_time(), 3.0);
    }

    #[test]
    fn test_shrinking_bar_wraps_on_next_advance() {
        let mut cursor = BeatCursor::new(0.0);
        for _ in 0..4 {
            cursor.advance(120, 6);
        }
        assert_eq!(cursor.beat_index(), 4);

        cursor.advance(120, 3);
        assert_eq!(cursor.beat_index(), 0);
    }

    #[test]
    fn test_tempo_applies_to_next_interval_only() {
        let mut cursor = BeatCursor::new(0.0);
        cursor.advance(120, 4);
        let committed = cursor.next_note_time();
        cursor.advance(60, 4);
        assert_eq!(committed, 0.5);
        assert_eq!(cursor.next_note_time(), 1.5);
    }

    #[test]
    fn test_is_due_and_reset() {
        let mut cursor = BeatCursor::new(0.1);
        assert!(cursor.is_due(0.2));
        assert!(!cursor.is_due(0.1));

        cursor.advance(120, 4);
        cursor.reset(5.0);
        assert_eq!(cursor.beat_index(), 0);
        assert_eq!(cursor.next_note_time(), 5.0);
    }
}
