//! Tracks the parts of the timeline that no content covers.
//!
//! The player keeps one tracker for video and one for audio and fills
//! whatever they report with black frames or silence.

use reelsync_core::{DCPTime, DCPTimePeriod};

#[derive(Debug, Clone)]
pub struct Empty {
    periods: Vec<DCPTimePeriod>,
    position: DCPTime,
}

impl Empty {
    /// The gaps in `[0, length)` left by `covered`.
    pub fn new(covered: &[DCPTimePeriod], length: DCPTime) -> Self {
        let mut covered: Vec<DCPTimePeriod> = covered.iter().copied().filter(|p| !p.is_empty()).collect();
        covered.sort_by_key(|p| p.from);

        let mut periods = Vec::new();
        let mut cursor = DCPTime::ZERO;
        for period in covered {
            if period.from > cursor {
                periods.push(DCPTimePeriod::new(cursor, period.from.min(length)));
            }
            cursor = cursor.max(period.to);
        }
        if cursor < length {
            periods.push(DCPTimePeriod::new(cursor, length));
        }
        periods.retain(|p| !p.is_empty());

        let mut empty = Self {
            periods,
            position: DCPTime::ZERO,
        };
        empty.set_position(DCPTime::ZERO);
        empty
    }

    pub fn periods(&self) -> &[DCPTimePeriod] {
        &self.periods
    }

    pub fn position(&self) -> DCPTime {
        self.position
    }

    /// The gap the position is in.
    pub fn period_at_position(&self) -> Option<DCPTimePeriod> {
        self.periods.iter().copied().find(|p| p.contains(self.position))
    }

    /// Move to `position`, or to the start of the next gap after it.
    pub fn set_position(&mut self, position: DCPTime) {
        self.position = position;
        if self.period_at_position().is_some() {
            return;
        }
        if let Some(next) = self.periods.iter().find(|p| p.from > position) {
            self.position = next.from;
        }
    }

    /// Whether every gap has been passed.
    pub fn done(&self) -> bool {
        self.periods.last().map_or(true, |last| self.position >= last.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(seconds: f64) -> DCPTime {
        DCPTime::from_seconds(seconds)
    }

    #[test]
    fn test_gaps_between_content() {
        let covered = [DCPTimePeriod::new(s(1.0), s(2.0)), DCPTimePeriod::new(s(1.5), s(3.0))];
        let empty = Empty::new(&covered, s(5.0));
        assert_eq!(
            empty.periods(),
            &[DCPTimePeriod::new(s(0.0), s(1.0)), DCPTimePeriod::new(s(3.0), s(5.0))]
        );
    }

    #[test]
    fn test_set_position_skips_to_next_gap() {
        let covered = [DCPTimePeriod::new(s(1.0), s(2.0))];
        let mut empty = Empty::new(&covered, s(3.0));
        assert_eq!(empty.position(), s(0.0));
        empty.set_position(s(1.0));
        assert_eq!(empty.position(), s(2.0));
        assert!(!empty.done());
        empty.set_position(s(3.0));
        assert!(empty.done());
    }

    #[test]
    fn test_fully_covered_is_done() {
        let covered = [DCPTimePeriod::new(s(0.0), s(3.0))];
        let empty = Empty::new(&covered, s(3.0));
        assert!(empty.done());
        assert!(empty.period_at_position().is_none());
    }
}
