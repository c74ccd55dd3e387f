//! Splits a fixed playback duration across segments in proportion to
//! `distance / speed_factor`.
//!
//! Speed factors only move time between segments; the sum of all durations
//! is always the base duration. When no segment has any distance to cover
//! the allocation is degenerate: every duration is zero and playback is
//! instantaneous.

use crate::models::library::DEFAULT_SPEED_FACTOR;

#[derive(Debug, Clone, PartialEq)]
pub struct TimeAllocation {
    pub durations: Vec<f64>,
    /// Cumulative end time of each segment; the last entry is `total_duration`.
    pub end_times: Vec<f64>,
    pub total_duration: f64,
}

impl TimeAllocation {
    pub fn allocate(distances: &[f64], speed_factors: &[f64], base_duration_secs: f64) -> Self {
        let weighted: Vec<f64> = distances
            .iter()
            .enumerate()
            .map(|(index, distance)| {
                let speed = effective_speed_factor(
                    speed_factors
                        .get(index)
                        .copied()
                        .unwrap_or(DEFAULT_SPEED_FACTOR),
                );
                sanitize_distance(*distance) / speed
            })
            .collect();
        let total_weighted: f64 = weighted.iter().sum();

        let base_is_valid = base_duration_secs.is_finite() && base_duration_secs > 0.0;
        if !base_is_valid || !total_weighted.is_finite() || total_weighted <= 0.0 {
            return Self::instantaneous(distances.len());
        }

        let durations: Vec<f64> = weighted
            .iter()
            .map(|weight| base_duration_secs * weight / total_weighted)
            .collect();

        let mut end_times = Vec::with_capacity(durations.len());
        let mut cursor = 0.0;
        for duration in &durations {
            cursor += duration;
            end_times.push(cursor.min(base_duration_secs));
        }
        if let Some(last) = end_times.last_mut() {
            *last = base_duration_secs;
        }

        Self {
            durations,
            end_times,
            total_duration: base_duration_secs,
        }
    }

    fn instantaneous(len: usize) -> Self {
        Self {
            durations: vec![0.0; len],
            end_times: vec![0.0; len],
            total_duration: 0.0,
        }
    }

    /// True when there is nothing to play back over time.
    pub fn is_degenerate(&self) -> bool {
        self.total_duration <= 0.0
    }

    pub fn start_time(&self, index: usize) -> f64 {
        if index == 0 {
            0.0
        } else {
            self.end_times
                .get(index - 1)
                .copied()
                .unwrap_or(self.total_duration)
        }
    }
}

/// Non-positive or non-finite factors fall back to the neutral factor.
pub fn effective_speed_factor(speed_factor: f64) -> f64 {
    if speed_factor.is_finite() && speed_factor > 0.0 {
        speed_factor
    } else {
        DEFAULT_SPEED_FACTOR
    }
}

fn sanitize_distance(distance: f64) -> f64 {
    if distance.is_finite() {
        distance.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_close(actual: &[f64], expected: &[f64], eps: f64) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < eps, "expected {expected:?}, got {actual:?}");
        }
    }

    #[test]
    fn equal_speeds_allocate_by_distance() {
        let allocation = TimeAllocation::allocate(&[100.0, 200.0, 300.0], &[1.0, 1.0, 1.0], 60.0);
        assert_close(&allocation.durations, &[10.0, 20.0, 30.0], EPS);
        assert_close(&allocation.end_times, &[10.0, 30.0, 60.0], EPS);
        assert_eq!(allocation.total_duration, 60.0);
    }

    #[test]
    fn faster_segment_gets_less_time() {
        let allocation = TimeAllocation::allocate(&[100.0, 200.0, 300.0], &[2.0, 1.0, 1.0], 60.0);
        let expected = [60.0 * 50.0 / 550.0, 60.0 * 200.0 / 550.0, 60.0 * 300.0 / 550.0];
        assert_close(&allocation.durations, &expected, EPS);
        assert!((allocation.durations[0] - 5.4545).abs() < 1e-3);
        assert!((allocation.durations[1] - 21.818).abs() < 1e-3);
        assert!((allocation.durations[2] - 32.727).abs() < 1e-3);
    }

    #[test]
    fn durations_always_sum_to_base() {
        let cases: [(&[f64], &[f64], f64); 4] = [
            (&[1.0, 2.0, 3.0], &[0.5, 1.7, 3.1], 42.0),
            (&[0.1, 1e4, 7.0, 0.0], &[1.0, 0.25, 9.0, 2.0], 180.0),
            (&[333.3; 9], &[1.1; 9], 61.7),
            (&[5.0], &[0.8], 1.0),
        ];
        for (distances, speeds, base) in cases {
            let allocation = TimeAllocation::allocate(distances, speeds, base);
            let sum: f64 = allocation.durations.iter().sum();
            assert!((sum - base).abs() < 1e-9, "sum {sum} != {base}");
            assert_eq!(*allocation.end_times.last().expect("end"), base);
        }
    }

    #[test]
    fn larger_speed_factor_means_strictly_shorter_duration() {
        let allocation = TimeAllocation::allocate(&[250.0, 250.0], &[1.5, 1.2], 30.0);
        assert!(allocation.durations[0] < allocation.durations[1]);
    }

    #[test]
    fn zero_distance_is_instantaneous_not_a_division_by_zero() {
        let allocation = TimeAllocation::allocate(&[0.0], &[1.0], 60.0);
        assert!(allocation.is_degenerate());
        assert_eq!(allocation.durations, vec![0.0]);
        assert_eq!(allocation.end_times, vec![0.0]);
        assert_eq!(allocation.total_duration, 0.0);
    }

    #[test]
    fn invalid_base_duration_is_degenerate() {
        let allocation = TimeAllocation::allocate(&[10.0, 20.0], &[1.0, 1.0], 0.0);
        assert!(allocation.is_degenerate());
        let allocation = TimeAllocation::allocate(&[10.0, 20.0], &[1.0, 1.0], f64::NAN);
        assert!(allocation.is_degenerate());
    }

    #[test]
    fn invalid_speed_factor_is_treated_as_neutral() {
        let allocation = TimeAllocation::allocate(&[100.0, 100.0], &[0.0, 1.0], 10.0);
        assert_close(&allocation.durations, &[5.0, 5.0], EPS);
        assert_eq!(effective_speed_factor(-2.0), 1.0);
    }

    #[test]
    fn zero_distance_segments_get_zero_time() {
        let allocation = TimeAllocation::allocate(&[100.0, 0.0, 100.0], &[1.0, 3.0, 1.0], 20.0);
        assert_close(&allocation.durations, &[10.0, 0.0, 10.0], EPS);
        assert_close(&allocation.end_times, &[10.0, 10.0, 20.0], EPS);
        assert_eq!(allocation.start_time(2), allocation.end_times[1]);
    }
}
