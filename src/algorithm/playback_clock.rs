//! Maps elapsed playback time to a vertical scroll offset and back.
//!
//! Each segment contributes one linear span `(start_time, end_time) ->
//! (start_offset, end_offset)`. Time lookups pick the first span whose
//! `end_time` is strictly greater than the elapsed time, so a boundary
//! instant belongs to the span that starts there. Offset lookups do the
//! same with `end_offset`.
//!
//! Known ambiguity: zero-duration spans (zero distance) are never selected
//! by either lookup. At an offset where such spans meet, `elapsed_time`
//! answers with the start of the next span that actually moves, which is
//! also the end time shared by every zero-duration span before it.

use crate::algorithm::layout::LayoutProjection;
use crate::algorithm::time_allocation::TimeAllocation;

const DEGENERATE_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockSpan {
    pub start_time: f64,
    pub end_time: f64,
    pub start_offset: f64,
    pub end_offset: f64,
}

impl ClockSpan {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn distance(&self) -> f64 {
        self.end_offset - self.start_offset
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackClock {
    spans: Vec<ClockSpan>,
    total_duration: f64,
    max_offset: f64,
}

impl PlaybackClock {
    /// Both tables must describe the same segments in the same order.
    pub fn new(projection: &LayoutProjection, allocation: &TimeAllocation) -> Self {
        let len = projection.len().min(allocation.end_times.len());
        let spans = (0..len)
            .map(|index| ClockSpan {
                start_time: allocation.start_time(index),
                end_time: allocation.end_times[index],
                start_offset: projection.start_offset(index),
                end_offset: projection.end_offsets[index],
            })
            .collect();
        Self::from_spans(spans)
    }

    pub fn from_spans(spans: Vec<ClockSpan>) -> Self {
        let total_duration = spans.last().map(|span| span.end_time).unwrap_or(0.0);
        let max_offset = spans.last().map(|span| span.end_offset).unwrap_or(0.0);
        Self {
            spans,
            total_duration,
            max_offset,
        }
    }

    pub fn spans(&self) -> &[ClockSpan] {
        &self.spans
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn max_offset(&self) -> f64 {
        self.max_offset
    }

    pub fn is_complete(&self, elapsed: f64) -> bool {
        elapsed >= self.total_duration
    }

    /// Index of the span playing at `elapsed`, `None` once playback is complete.
    pub fn segment_index_at(&self, elapsed: f64) -> Option<usize> {
        if self.spans.is_empty() || self.is_complete(elapsed) {
            return None;
        }
        let elapsed = if elapsed.is_nan() { 0.0 } else { elapsed.max(0.0) };
        let index = self.spans.partition_point(|span| span.end_time <= elapsed);
        (index < self.spans.len()).then_some(index)
    }

    /// Scroll offset at `elapsed` seconds of playback.
    pub fn position(&self, elapsed: f64) -> f64 {
        if self.spans.is_empty() {
            return 0.0;
        }
        if self.is_complete(elapsed) {
            return self.max_offset;
        }
        let Some(index) = self.segment_index_at(elapsed) else {
            return self.max_offset;
        };

        let elapsed = if elapsed.is_nan() { 0.0 } else { elapsed.max(0.0) };
        let span = self.spans[index];
        let duration = span.duration();
        if duration <= DEGENERATE_EPS {
            return span.start_offset;
        }
        let progress = ((elapsed - span.start_time) / duration).clamp(0.0, 1.0);
        span.start_offset + span.distance() * progress
    }

    /// Elapsed time at which playback passes `offset`; the inverse of [`position`].
    ///
    /// [`position`]: PlaybackClock::position
    pub fn elapsed_time(&self, offset: f64) -> f64 {
        if self.spans.is_empty() || self.max_offset <= 0.0 {
            return 0.0;
        }
        let offset = if offset.is_nan() {
            0.0
        } else {
            offset.clamp(0.0, self.max_offset)
        };
        if offset >= self.max_offset {
            return self.total_duration;
        }

        let index = self.spans.partition_point(|span| span.end_offset <= offset);
        let Some(span) = self.spans.get(index) else {
            return self.total_duration;
        };
        let distance = span.distance();
        if distance <= DEGENERATE_EPS {
            return span.start_time;
        }
        let progress = ((offset - span.start_offset) / distance).clamp(0.0, 1.0);
        span.start_time + span.duration() * progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::layout::project_segments;

    const EPS: f64 = 1e-9;

    /// Builds a clock whose per-segment distances are exactly `distances`.
    fn clock_for(distances: &[f64], speeds: &[f64], base: f64) -> PlaybackClock {
        let mut end = 0.0;
        let mut projection = project_segments(&[], 0.0, 0.0, 0.0);
        for distance in distances {
            end += distance;
            projection.end_offsets.push(end);
        }
        projection.max_offset = end;
        let allocation = TimeAllocation::allocate(&projection.distances(), speeds, base);
        PlaybackClock::new(&projection, &allocation)
    }

    #[test]
    fn position_interpolates_within_segments() {
        let clock = clock_for(&[100.0, 200.0, 300.0], &[1.0, 1.0, 1.0], 60.0);
        assert!((clock.position(0.0) - 0.0).abs() < EPS);
        assert!((clock.position(5.0) - 50.0).abs() < EPS);
        assert!((clock.position(20.0) - 200.0).abs() < EPS);
        assert!((clock.position(45.0) - 450.0).abs() < EPS);
    }

    #[test]
    fn boundary_time_belongs_to_the_next_segment() {
        let clock = clock_for(&[100.0, 200.0, 300.0], &[1.0, 1.0, 1.0], 60.0);
        assert_eq!(clock.segment_index_at(10.0), Some(1));
        assert_eq!(clock.segment_index_at(9.999), Some(0));
        assert!((clock.position(10.0) - 100.0).abs() < EPS);
    }

    #[test]
    fn completion_lands_exactly_on_max_offset() {
        let clock = clock_for(&[33.3, 66.7, 0.1, 17.9], &[1.3, 0.7, 2.0, 1.1], 47.0);
        assert_eq!(clock.position(clock.total_duration()), clock.max_offset());
        assert_eq!(clock.position(clock.total_duration() + 5.0), clock.max_offset());
        assert!(clock.is_complete(clock.total_duration()));
        assert_eq!(clock.segment_index_at(clock.total_duration()), None);
    }

    #[test]
    fn position_never_moves_backwards() {
        let clock = clock_for(&[120.0, 0.0, 80.0, 400.0], &[1.0, 1.0, 2.5, 0.5], 90.0);
        let mut previous = clock.position(0.0);
        let steps = 2_000;
        for step in 1..=steps {
            let t = clock.total_duration() * step as f64 / steps as f64;
            let current = clock.position(t);
            assert!(current + EPS >= previous, "went back at t={t}");
            previous = current;
        }
    }

    #[test]
    fn offset_time_round_trip() {
        let clock = clock_for(&[120.0, 35.0, 80.0, 400.0], &[1.0, 1.7, 2.5, 0.5], 90.0);
        for step in 0..=500 {
            let y = clock.max_offset() * step as f64 / 500.0;
            let back = clock.position(clock.elapsed_time(y));
            assert!((back - y).abs() < 1e-6, "offset {y} came back as {back}");
        }
        for step in 0..=500 {
            let t = clock.total_duration() * step as f64 / 500.0;
            let back = clock.elapsed_time(clock.position(t));
            assert!((back - t).abs() < 1e-6, "time {t} came back as {back}");
        }
    }

    #[test]
    fn zero_distance_segment_resolves_to_next_moving_span() {
        let clock = clock_for(&[100.0, 0.0, 100.0], &[1.0, 1.0, 1.0], 20.0);
        assert!((clock.elapsed_time(100.0) - 10.0).abs() < EPS);
        assert!((clock.position(10.0) - 100.0).abs() < EPS);
    }

    #[test]
    fn resume_offset_in_second_segment_maps_inside_its_time_range() {
        let clock = clock_for(&[100.0, 200.0, 300.0], &[1.0, 1.0, 1.0], 60.0);
        let y = 0.4 * clock.max_offset();
        let t = clock.elapsed_time(y);
        let span = clock.spans()[1];
        assert!(t > span.start_time && t < span.end_time, "t={t}");
    }

    #[test]
    fn offsets_outside_range_are_clamped() {
        let clock = clock_for(&[100.0, 100.0], &[1.0, 1.0], 10.0);
        assert_eq!(clock.elapsed_time(-50.0), 0.0);
        assert_eq!(clock.elapsed_time(1_000.0), clock.total_duration());
        assert_eq!(clock.position(-3.0), 0.0);
    }

    #[test]
    fn degenerate_timeline_is_complete_immediately() {
        let clock = clock_for(&[0.0], &[1.0], 60.0);
        assert_eq!(clock.total_duration(), 0.0);
        assert!(clock.is_complete(0.0));
        assert_eq!(clock.position(0.0), 0.0);
        assert_eq!(clock.elapsed_time(0.0), 0.0);
    }

    #[test]
    fn empty_clock_is_inert() {
        let clock = PlaybackClock::from_spans(Vec::new());
        assert_eq!(clock.position(3.0), 0.0);
        assert_eq!(clock.elapsed_time(3.0), 0.0);
        assert_eq!(clock.segment_index_at(0.0), None);
    }
}
