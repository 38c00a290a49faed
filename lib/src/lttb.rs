use std::borrow::Cow;
use std::collections::HashSet;

use crate::{DownsampleError, Sample};

/// Shift, in seconds, applied to a timestamp that collides with an earlier one.
const COLLISION_STEP: f64 = 0.001;

/// Largest Triangle Three Buckets (LTTB) downsampling algorithm.
///
/// Reduces a series sorted by ascending timestamp to exactly `threshold`
/// samples while preserving the visual shape of the data: within every bucket
/// it keeps the sample forming the largest triangle with the previously kept
/// sample and the average of the next bucket, so short dips and spikes
/// survive. The first and last samples are always kept.
///
/// Returns the input unchanged (borrowed) if `data.len() <= threshold` or
/// `threshold < 3`. Selected samples are cloned from the input, never rebuilt.
///
/// Fails with [`DownsampleError::MalformedInput`] if a timestamp or value of
/// a series that needs downsampling is not finite.
pub fn downsample<S: Sample + Clone>(
    data: &[S],
    threshold: usize,
) -> Result<Cow<'_, [S]>, DownsampleError> {
    let n = data.len();
    if n <= threshold || threshold < 3 {
        return Ok(Cow::Borrowed(data));
    }

    let points = plot_points(data)?;

    let mut sampled = Vec::with_capacity(threshold);
    sampled.push(data[0].clone());

    let bucket_size = (n - 2) as f64 / (threshold - 2) as f64;
    let edge = |i: usize| (i as f64 * bucket_size) as usize + 1;

    let mut a_idx = 0usize;

    for i in 0..(threshold - 2) {
        // Clamped so a bucket never overlaps the previous pick nor the last point.
        let bucket_start = edge(i).max(a_idx + 1);
        let bucket_end = edge(i + 1).max(bucket_start + 1).min(n - 1);
        debug_assert!(bucket_start < bucket_end);

        // Average of the next bucket for the triangle area calculation.
        let next_end = edge(i + 2).clamp(bucket_end, n);
        let (avg_x, avg_y) = centroid(&points[bucket_end..next_end]).unwrap_or(points[n - 1]);

        let (ax, ay) = points[a_idx];
        let mut max_area = -1.0f64;
        let mut max_idx = bucket_start;

        for (j, &(x, y)) in points
            .iter()
            .enumerate()
            .take(bucket_end)
            .skip(bucket_start)
        {
            let area = 0.5 * ((ax - avg_x) * (y - ay) - (ax - x) * (avg_y - ay)).abs();
            if area > max_area {
                max_area = area;
                max_idx = j;
            }
        }

        sampled.push(data[max_idx].clone());
        a_idx = max_idx;
    }

    sampled.push(data[n - 1].clone());
    Ok(Cow::Owned(sampled))
}

// Project samples onto the plane, nudging repeated timestamps forward until
// every x is unique.
fn plot_points<S: Sample>(data: &[S]) -> Result<Vec<(f64, f64)>, DownsampleError> {
    let mut seen = HashSet::with_capacity(data.len());
    let mut points = Vec::with_capacity(data.len());

    for (index, sample) in data.iter().enumerate() {
        let mut x = sample.timestamp();
        if !x.is_finite() {
            return Err(DownsampleError::MalformedInput {
                index,
                field: "timestamp",
            });
        }
        let y = sample.value();
        if !y.is_finite() {
            return Err(DownsampleError::MalformedInput {
                index,
                field: "value",
            });
        }

        // Step grows with magnitude so it always moves x.
        let step = COLLISION_STEP.max(x.abs() * 2.0 * f64::EPSILON);
        while !seen.insert(x.to_bits()) {
            x += step;
        }
        points.push((x, y));
    }

    Ok(points)
}

fn centroid(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    if points.is_empty() {
        return None;
    }
    let (sum_x, sum_y) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
    let len = points.len() as f64;
    Some((sum_x / len, sum_y / len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Reading {
        id: usize,
        at: f64,
        qty: f64,
    }

    impl Sample for Reading {
        fn timestamp(&self) -> f64 {
            self.at
        }

        fn value(&self) -> f64 {
            self.qty
        }
    }

    const HOUR: f64 = 3600.0;
    const START: f64 = 1_700_000_000.0;

    fn hourly(values: &[f64]) -> Vec<Reading> {
        values
            .iter()
            .enumerate()
            .map(|(id, &qty)| Reading {
                id,
                at: START + id as f64 * HOUR,
                qty,
            })
            .collect()
    }

    fn ids(readings: &[Reading]) -> Vec<usize> {
        readings.iter().map(|r| r.id).collect()
    }

    fn wave(n: usize) -> Vec<Reading> {
        let values: Vec<f64> = (0..n)
            .map(|i| 50.0 + 40.0 * (i as f64 / 7.0).sin() - (i % 13) as f64)
            .collect();
        hourly(&values)
    }

    #[test]
    fn threshold_ge_n_returns_original() {
        let data: Vec<(f64, f64)> = (0..5).map(|i| (i as f64, i as f64)).collect();
        assert_eq!(downsample(&data, 5).unwrap().as_ref(), &data[..]);
        assert_eq!(downsample(&data, 10).unwrap().as_ref(), &data[..]);
        assert!(matches!(downsample(&data, 5).unwrap(), Cow::Borrowed(_)));
    }

    #[test]
    fn threshold_lt_3_returns_original() {
        let data = wave(50);
        for threshold in 0..3 {
            let result = downsample(&data, threshold).unwrap();
            assert!(matches!(result, Cow::Borrowed(_)));
            assert_eq!(result.as_ref(), &data[..]);
        }
    }

    #[test]
    fn empty_input() {
        let data: Vec<(f64, f64)> = Vec::new();
        assert!(downsample(&data, 200).unwrap().is_empty());
        assert!(downsample(&data, 0).unwrap().is_empty());
    }

    #[test]
    fn preserves_first_and_last() {
        let data: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, i as f64)).collect();
        let result = downsample(&data, 5).unwrap();
        assert_eq!(result.first(), Some(&(0.0, 0.0)));
        assert_eq!(result.last(), Some(&(9.0, 9.0)));
    }

    #[test]
    fn correct_downsampling_size() {
        let data: Vec<(f64, f64)> = (0..100).map(|i| (i as f64, (i * i) as f64)).collect();
        assert_eq!(downsample(&data, 20).unwrap().len(), 20);

        let data = wave(1000);
        for threshold in [3, 4, 7, 200, 999] {
            assert_eq!(downsample(&data, threshold).unwrap().len(), threshold);
        }
    }

    #[test]
    fn output_is_ordered_subsequence() {
        let data = wave(500);
        let result = downsample(&data, 37).unwrap();
        let picked = ids(&result);
        assert!(picked.windows(2).all(|w| w[0] < w[1]));
        for r in result.iter() {
            assert_eq!(r, &data[r.id]);
        }
    }

    #[test]
    fn deterministic() {
        let data = wave(300);
        let first = downsample(&data, 50).unwrap().into_owned();
        for _ in 0..5 {
            assert_eq!(downsample(&data, 50).unwrap().as_ref(), &first[..]);
        }
    }

    #[test]
    fn keeps_stock_dips() {
        let data = hourly(&[50.0, 48.0, 5.0, 47.0, 46.0, 45.0, 44.0, 6.0, 43.0, 42.0]);
        let result = downsample(&data, 5).unwrap();

        assert_eq!(result.len(), 5);
        assert_eq!(result[0], data[0]);
        assert_eq!(result[4], data[9]);
        assert_eq!(ids(&result), vec![0, 2, 3, 7, 9]);
        assert_ne!(ids(&result), vec![0, 2, 4, 6, 9]);
    }

    #[test]
    fn known_downsampling() {
        let data = vec![
            (0.0, 0.0),
            (1.0, 10.0),
            (2.0, 2.0),
            (3.0, 8.0),
            (4.0, 4.0),
            (5.0, 6.0),
            (6.0, 1.0),
            (7.0, 9.0),
            (8.0, 3.0),
            (9.0, 7.0),
        ];
        let result = downsample(&data, 5).unwrap();
        assert_eq!(
            result.as_ref(),
            &[(0.0, 0.0), (1.0, 10.0), (4.0, 4.0), (6.0, 1.0), (9.0, 7.0)][..]
        );
    }

    #[test]
    fn first_maximal_area_wins() {
        // Points 1 and 2 sit at the same distance from the line through
        // point 0 and the next bucket's average, so their areas are equal.
        let data = vec![
            (0.0, 0.0),
            (1.0, 1.0),
            (2.0, -1.0),
            (3.0, 0.0),
            (4.0, 0.0),
            (5.0, 0.0),
        ];
        let result = downsample(&data, 4).unwrap();
        assert_eq!(result[1], (1.0, 1.0));
    }

    #[test]
    fn duplicate_timestamps() {
        let mut data = hourly(&[10.0, 20.0, 3.0, 25.0, 24.0, 1.0, 30.0, 29.0, 28.0, 27.0]);
        data[2].at = data[1].at;
        data[3].at = data[1].at;
        data[6].at = data[5].at;

        let result = downsample(&data, 5).unwrap();
        assert_eq!(result.len(), 5);
        assert_eq!(result[0], data[0]);
        assert_eq!(result[4], data[9]);

        let picked = ids(&result);
        assert!(picked.windows(2).all(|w| w[0] < w[1]));
        for r in result.iter() {
            // Original, non-jittered timestamps come back.
            assert_eq!(r.at, data[r.id].at);
        }
        assert!(result.iter().all(|r| r.at.fract() == 0.0));
    }

    #[test]
    fn all_timestamps_equal() {
        let data: Vec<(f64, f64)> = (0..20).map(|i| (5.0, (i % 4) as f64)).collect();
        let result = downsample(&data, 6).unwrap();
        assert_eq!(result.len(), 6);
        assert!(result.iter().all(|p| p.0 == 5.0));
    }

    #[test]
    fn near_threshold_sizes_never_panic() {
        for threshold in 3..60 {
            for extra in 1..4 {
                let data = wave(threshold + extra);
                let result = downsample(&data, threshold).unwrap();
                assert_eq!(result.len(), threshold);
                assert_eq!(result[0], data[0]);
                assert_eq!(result[threshold - 1], data[data.len() - 1]);
                let picked = ids(&result);
                assert!(
                    picked.windows(2).all(|w| w[0] < w[1]),
                    "n={} threshold={} picked={:?}",
                    data.len(),
                    threshold,
                    picked
                );
            }
        }
    }

    #[test]
    fn non_finite_samples_are_malformed() {
        let mut data = wave(10);
        data[4].qty = f64::NAN;
        assert_eq!(
            downsample(&data, 5),
            Err(DownsampleError::MalformedInput {
                index: 4,
                field: "value"
            })
        );

        let mut data = wave(10);
        data[7].at = f64::INFINITY;
        assert_eq!(
            downsample(&data, 5),
            Err(DownsampleError::MalformedInput {
                index: 7,
                field: "timestamp"
            })
        );
    }

    #[test]
    fn single_point() {
        let data = vec![(1.0, 1.0)];
        assert_eq!(downsample(&data, 5).unwrap().as_ref(), &data[..]);
    }

    #[test]
    fn two_points() {
        let data = vec![(0.0, 0.0), (1.0, 1.0)];
        assert_eq!(downsample(&data, 5).unwrap().as_ref(), &data[..]);
    }

    #[test]
    fn three_points_to_three() {
        let data = vec![(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)];
        assert_eq!(downsample(&data, 3).unwrap().as_ref(), &data[..]);
    }
}
