//! Half-open time intervals for representing event durations.
//!
//! A TimeSpan represents an interval [begin, end) using exact rational numbers.
//! Key operations include splitting spans at cycle boundaries and computing intersections.

use super::Fraction;

/// Half-open time interval [begin, end).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeSpan {
    pub begin: Fraction,
    pub end: Fraction,
}

impl TimeSpan {
    /// Create a new timespan from begin and end fractions.
    pub fn new(begin: Fraction, end: Fraction) -> Self {
        Self { begin, end }
    }

    /// Create a timespan from integer values.
    pub fn from_integers(begin: i64, end: i64) -> Self {
        Self {
            begin: Fraction::from_integer(begin),
            end: Fraction::from_integer(end),
        }
    }

    /// Duration of this span (end - begin).
    pub fn duration(&self) -> Fraction {
        &self.end - &self.begin
    }

    /// Split a span at cycle boundaries.
    ///
    /// Returns a list of spans, each contained within a single cycle.
    /// For example, [0.5, 2.3) becomes [[0.5, 1), [1, 2), [2, 2.3)].
    pub fn span_cycles(&self) -> Vec<TimeSpan> {
        let mut spans = Vec::new();
        let mut begin = self.begin.clone();

        // Handle zero-width (point) spans
        if begin == self.end {
            return vec![TimeSpan::new(begin, self.end.clone())];
        }

        // Handle reverse spans (shouldn't happen but be defensive)
        if begin > self.end {
            return spans;
        }

        let end_sam = self.end.sam();

        while self.end > begin {
            if begin.sam() == end_sam {
                // We're in the final cycle
                spans.push(TimeSpan::new(begin, self.end.clone()));
                break;
            }
            let next_begin = begin.next_sam();
            spans.push(TimeSpan::new(begin.clone(), next_begin.clone()));
            begin = next_begin;
        }

        spans
    }

    /// Intersection of two spans, returns None if disjoint.
    ///
    /// Handles zero-width (point) intersections specially.
    pub fn intersection(&self, other: &TimeSpan) -> Option<TimeSpan> {
        let intersect_begin = self.begin.max_of(&other.begin);
        let intersect_end = self.end.min_of(&other.end);

        if intersect_begin > intersect_end {
            return None;
        }

        // Handle zero-width (point) intersection
        if intersect_begin == intersect_end {
            // Don't allow point intersection at the exclusive end of either span
            if intersect_begin == self.end && self.begin < self.end {
                return None;
            }
            if intersect_begin == other.end && other.begin < other.end {
                return None;
            }
        }

        Some(TimeSpan::new(intersect_begin, intersect_end))
    }

    /// Returns the intersection or panics if none exists.
    pub fn intersection_e(&self, other: &TimeSpan) -> TimeSpan {
        self.intersection(other)
            .expect("TimeSpan intersection failed - spans are disjoint")
    }

    /// Apply a function to both begin and end times.
    pub fn with_time<F>(&self, f: F) -> TimeSpan
    where
        F: Fn(&Fraction) -> Fraction,
    {
        TimeSpan::new(f(&self.begin), f(&self.end))
    }

    /// Shift span to cycle zero while preserving duration.
    /// Returns a span starting at the cycle position within [0, 1).
    pub fn cycle_arc(&self) -> TimeSpan {
        let b = self.begin.cycle_pos();
        let e = &b + &self.duration();
        TimeSpan::new(b, e)
    }

    /// Check if a time is within this span [begin, end).
    pub fn contains(&self, time: &Fraction) -> bool {
        time >= &self.begin && time < &self.end
    }

    /// Check if this span is zero-width (a point).
    pub fn is_point(&self) -> bool {
        self.begin == self.end
    }

    /// Midpoint of the span.
    pub fn midpoint(&self) -> Fraction {
        (&self.begin + &self.end) / Fraction::from_integer(2)
    }

    // ===== f64 Fast-Path Methods for DSP =====

    /// Get begin time as f64 (for fast DSP comparisons).
    #[inline]
    pub fn begin_f64(&self) -> f64 {
        self.begin.to_f64()
    }

    /// Get end time as f64 (for fast DSP comparisons).
    #[inline]
    pub fn end_f64(&self) -> f64 {
        self.end.to_f64()
    }

    /// Get duration as f64.
    #[inline]
    pub fn duration_f64(&self) -> f64 {
        self.end_f64() - self.begin_f64()
    }

    /// Fast containment check using f64.
    /// Checks if time t is within [begin, end).
    #[inline]
    pub fn contains_f64(&self, t: f64) -> bool {
        t >= self.begin_f64() && t < self.end_f64()
    }
}

impl Default for TimeSpan {
    fn default() -> Self {
        TimeSpan::new(Fraction::from_integer(0), Fraction::from_integer(1))
    }
}
